//! Real-time setup configuration.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::platform;

/// Real-time setup for one thread.
///
/// Workers apply their service's setup on entry; the timer thread applies
/// the sequencer's timer setup. A failure to apply either attribute is
/// logged and the thread keeps running with whatever the OS left in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtSetup {
    /// Requested real-time priority.
    ///
    /// On Linux: SCHED_FIFO, clamped into `sched_get_priority_min/max`.
    /// On Windows: mapped onto the thread priority bands.
    /// `None` or a value `<= 0` keeps the inherited, non-real-time policy.
    pub priority: Option<i32>,

    /// Core index to pin the thread to (None = no affinity).
    pub cpu_affinity: Option<usize>,
}

/// What [`RtSetup::apply`] achieved on the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppliedSetup {
    /// Priority result, `None` when no real-time priority was requested.
    pub priority: Option<Result<i32, PlatformError>>,
    /// Affinity result, `None` when no affinity was requested.
    pub affinity: Option<Result<usize, PlatformError>>,
}

impl AppliedSetup {
    /// Whether every requested attribute was applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.priority.is_none_or(|r| r.is_ok()) && self.affinity.is_none_or(|r| r.is_ok())
    }
}

impl RtSetup {
    /// Create a new RtSetup with no special configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal RtSetup (no special configuration).
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            priority: None,
            cpu_affinity: None,
        }
    }

    /// Set the real-time priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the CPU affinity.
    #[must_use]
    pub fn with_cpu_affinity(mut self, core: usize) -> Self {
        self.cpu_affinity = Some(core);
        self
    }

    /// Real-time priority to request, if any.
    #[must_use]
    pub fn realtime_priority(&self) -> Option<i32> {
        self.priority.filter(|&p| p > 0)
    }

    /// Check if any RT features are enabled.
    #[must_use]
    pub fn has_rt_features(&self) -> bool {
        self.realtime_priority().is_some() || self.cpu_affinity.is_some()
    }

    /// Apply the setup to the calling thread, logging every outcome under
    /// `thread`.
    pub fn apply(&self, thread: &str) -> AppliedSetup {
        let priority = self.realtime_priority().map(|requested| {
            let result = platform::set_current_thread_priority(requested);
            match &result {
                Ok(applied) => debug!(thread, requested, applied, "real-time priority applied"),
                Err(err) => warn!(
                    thread,
                    requested,
                    error = %err,
                    "could not apply real-time priority; continuing with default scheduling"
                ),
            }
            result
        });

        let affinity = self.cpu_affinity.map(|core| {
            let result = platform::set_current_thread_affinity(core).map(|()| core);
            match &result {
                Ok(_) => debug!(thread, core, "cpu affinity applied"),
                Err(err) => warn!(
                    thread,
                    core,
                    error = %err,
                    "could not apply cpu affinity; continuing unpinned"
                ),
            }
            result
        });

        AppliedSetup { priority, affinity }
    }
}

/// Highest real-time priority the platform offers, if it has a real-time
/// scale at all.
#[must_use]
pub fn max_realtime_priority() -> Option<i32> {
    platform::max_realtime_priority()
}

/// Rate-monotonic priority assignment.
///
/// Returns one priority per entry of `periods_ms`, in the same order. The
/// shortest period gets `highest`, each longer distinct period one less,
/// and equal periods share a priority. Values never drop below 1.
///
/// # Example
///
/// ```rust
/// use rtseq_scheduler::rate_monotonic_priorities;
///
/// let priorities = rate_monotonic_priorities(&[50, 20, 100, 20], 99);
/// assert_eq!(priorities, vec![98, 99, 97, 99]);
/// ```
#[must_use]
pub fn rate_monotonic_priorities(periods_ms: &[u64], highest: i32) -> Vec<i32> {
    let mut distinct: Vec<u64> = periods_ms.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    periods_ms
        .iter()
        .map(|period| {
            let rank = distinct.partition_point(|p| p < period);
            let rank = i32::try_from(rank).unwrap_or(i32::MAX);
            highest.saturating_sub(rank).max(1)
        })
        .collect()
}
