//! Per-service statistics aggregator.
//!
//! [`ServiceStats`] collects everything the sequencer measures for one
//! service: execution time, execution-time jitter, release jitter and
//! deadline behaviour, plus the fault and release-loss counters.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::stat::{AtomicStat, StatSnapshot};

/// Marker for "no execution recorded yet".
const NO_PREVIOUS: u64 = u64::MAX;

/// Snapshot of a [`ServiceStats`] aggregator.
///
/// All durations are nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceStatsSnapshot {
    /// Callback execution time.
    pub execution: StatSnapshot,
    /// Absolute difference between consecutive execution times.
    pub execution_jitter: StatSnapshot,
    /// Actual wake instant minus scheduled release instant.
    pub release_jitter: StatSnapshot,
    /// Completion instant minus deadline, recorded for missed deadlines only.
    pub lateness: StatSnapshot,
    /// Callback invocations that panicked.
    pub faults: u64,
    /// Whole periods the dispatcher advanced past without releasing.
    pub skipped_periods: u64,
    /// Releases discarded because the release backlog was full.
    pub dropped_releases: u64,
}

impl ServiceStatsSnapshot {
    /// Number of executions started.
    #[must_use]
    pub const fn releases(&self) -> u64 {
        self.execution.count
    }

    /// Number of executions that completed after their deadline.
    #[must_use]
    pub const fn deadline_misses(&self) -> u64 {
        self.lateness.count
    }

    /// Largest deadline overrun, `None` when no deadline was missed.
    #[must_use]
    pub const fn max_lateness(&self) -> Option<u64> {
        self.lateness.max()
    }

    /// Deadline misses as a percentage of executions.
    ///
    /// Returns 0.0 when nothing has executed.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "counts far below 2^52 in practice; percentage is for display"
    )]
    pub fn miss_rate_percent(&self) -> f64 {
        if self.execution.count == 0 {
            return 0.0;
        }
        (self.lateness.count as f64 / self.execution.count as f64) * 100.0
    }
}

/// Lock-free statistics aggregator for one service.
///
/// # Thread Safety
///
/// Written by the service's worker thread and read by the reporting path.
/// Each tracked quantity is an [`AtomicStat`], so concurrent readers always
/// see `min <= mean <= max`. Execution-time jitter is derived with an atomic
/// swap of the previous execution time, which keeps it correct even if more
/// than one thread records executions.
///
/// # RT Safety
///
/// Every `record_*` method is allocation-free and non-blocking.
#[derive(Debug)]
pub struct ServiceStats {
    execution: AtomicStat,
    execution_jitter: AtomicStat,
    release_jitter: AtomicStat,
    lateness: AtomicStat,
    previous_execution_ns: AtomicU64,
    faults: AtomicU64,
    skipped_periods: AtomicU64,
    dropped_releases: AtomicU64,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    /// Create an empty aggregator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            execution: AtomicStat::new(),
            execution_jitter: AtomicStat::new(),
            release_jitter: AtomicStat::new(),
            lateness: AtomicStat::new(),
            previous_execution_ns: AtomicU64::new(NO_PREVIOUS),
            faults: AtomicU64::new(0),
            skipped_periods: AtomicU64::new(0),
            dropped_releases: AtomicU64::new(0),
        }
    }

    /// Record the delay between a release's scheduled instant and the
    /// worker's wake-up.
    ///
    /// Callers floor negative delays to zero before recording.
    #[inline]
    pub fn record_release_jitter(&self, jitter_ns: u64) {
        self.release_jitter.record(jitter_ns);
    }

    /// Record one execution time.
    ///
    /// The first execution only seeds the jitter baseline; every later one
    /// also records `|current - previous|` as execution-time jitter.
    #[inline]
    pub fn record_execution(&self, execution_ns: u64) {
        let execution_ns = execution_ns.min(NO_PREVIOUS - 1);
        self.execution.record(execution_ns);

        let previous = self
            .previous_execution_ns
            .swap(execution_ns, Ordering::AcqRel);
        if previous != NO_PREVIOUS {
            self.execution_jitter
                .record(execution_ns.abs_diff(previous));
        }
    }

    /// Record a deadline miss together with how late the completion was.
    #[inline]
    pub fn record_deadline_miss(&self, lateness_ns: u64) {
        self.lateness.record(lateness_ns);
    }

    /// Record a callback fault caught at the worker boundary.
    #[inline]
    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Record periods the dispatcher skipped while catching up.
    #[inline]
    pub fn record_skipped_periods(&self, periods: u64) {
        self.skipped_periods.fetch_add(periods, Ordering::Relaxed);
    }

    /// Record a release discarded because the backlog was full.
    #[inline]
    pub fn record_dropped_release(&self) {
        self.dropped_releases.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of executions recorded so far.
    #[inline]
    #[must_use]
    pub fn releases(&self) -> u64 {
        self.execution.count()
    }

    /// Number of deadline misses recorded so far.
    #[inline]
    #[must_use]
    pub fn deadline_misses(&self) -> u64 {
        self.lateness.count()
    }

    /// Number of callback faults recorded so far.
    #[inline]
    #[must_use]
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Take a snapshot of every tracked quantity.
    ///
    /// Each [`StatSnapshot`] is internally consistent; the snapshot as a whole
    /// is not atomic across quantities.
    #[must_use]
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            execution: self.execution.snapshot(),
            execution_jitter: self.execution_jitter.snapshot(),
            release_jitter: self.release_jitter.snapshot(),
            lateness: self.lateness.snapshot(),
            faults: self.faults.load(Ordering::Relaxed),
            skipped_periods: self.skipped_periods.load(Ordering::Relaxed),
            dropped_releases: self.dropped_releases.load(Ordering::Relaxed),
        }
    }
}
