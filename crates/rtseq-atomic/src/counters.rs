//! Atomic counters kept by the tick source.
//!
//! The timer thread bumps these once per tick; the reporting path reads them
//! with [`TickCounters::snapshot`].
//!
//! # RT Safety
//!
//! All methods are a single relaxed atomic operation per counter. The
//! counters are independent, so relaxed ordering is enough.

use core::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`TickCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickCounterSnapshot {
    /// Ticks delivered to the dispatcher.
    pub ticks: u64,
    /// Ticks skipped because the tick source fell behind.
    pub overruns: u64,
}

impl TickCounterSnapshot {
    /// Skipped ticks as a percentage of all scheduled ticks.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "counts far below 2^52 in practice; percentage is for display"
    )]
    pub fn overrun_rate_percent(&self) -> f64 {
        let scheduled = self.ticks.saturating_add(self.overruns);
        if scheduled == 0 {
            return 0.0;
        }
        (self.overruns as f64 / scheduled as f64) * 100.0
    }
}

/// Tick and overrun counters for a tick source.
///
/// # Example
///
/// ```rust
/// use rtseq_atomic::TickCounters;
///
/// let counters = TickCounters::new();
/// counters.inc_tick();
/// counters.inc_overrun_by(2);
///
/// let snapshot = counters.snapshot();
/// assert_eq!(snapshot.ticks, 1);
/// assert_eq!(snapshot.overruns, 2);
/// ```
#[derive(Debug)]
pub struct TickCounters {
    ticks: AtomicU64,
    overruns: AtomicU64,
}

impl Default for TickCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl TickCounters {
    /// Create counters initialized to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        }
    }

    /// Count one delivered tick.
    #[inline]
    pub fn inc_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count ticks skipped after the source fell behind.
    #[inline]
    pub fn inc_overrun_by(&self, amount: u64) {
        self.overruns.fetch_add(amount, Ordering::Relaxed);
    }

    /// Current tick count.
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Current overrun count.
    #[inline]
    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Read all counters without resetting them.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> TickCounterSnapshot {
        TickCounterSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }

    /// Read all counters and reset them to zero.
    ///
    /// **NOT RT-safe** in the sense that the two swaps are not atomic with
    /// each other; call from the reporting path.
    #[inline]
    #[must_use]
    pub fn snapshot_and_reset(&self) -> TickCounterSnapshot {
        TickCounterSnapshot {
            ticks: self.ticks.swap(0, Ordering::Relaxed),
            overruns: self.overruns.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = TickCounters::default();
        assert_eq!(counters.snapshot(), TickCounterSnapshot::default());
    }

    #[test]
    fn test_inc_and_snapshot() {
        let counters = TickCounters::new();
        counters.inc_tick();
        counters.inc_tick();
        counters.inc_overrun_by(3);

        assert_eq!(counters.ticks(), 2);
        assert_eq!(counters.overruns(), 3);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let counters = TickCounters::new();
        counters.inc_tick();
        counters.inc_overrun_by(1);

        let first = counters.snapshot_and_reset();
        let second = counters.snapshot();

        assert_eq!(first.ticks, 1);
        assert_eq!(first.overruns, 1);
        assert_eq!(second, TickCounterSnapshot::default());
    }

    #[test]
    fn test_overrun_rate() {
        let snapshot = TickCounterSnapshot {
            ticks: 75,
            overruns: 25,
        };
        assert!((snapshot.overrun_rate_percent() - 25.0).abs() < f64::EPSILON);
        assert!(
            TickCounterSnapshot::default()
                .overrun_rate_percent()
                .abs()
                < f64::EPSILON
        );
    }
}
