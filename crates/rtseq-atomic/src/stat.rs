//! Lock-free accumulator for a single timing quantity.
//!
//! [`AtomicStat`] keeps the minimum, maximum, running total and sample count of
//! one quantity (execution time, jitter, lateness). Values are nanoseconds by
//! convention but nothing in this module depends on the unit.
//!
//! # Update protocol
//!
//! A writer announces itself by bumping `started`, folds the sample into the
//! extrema with compare-and-retry loops, adds it to the total and finally
//! bumps `count`. A reader loads `count`, then the fields, then `started`;
//! the read is consistent when no writer started after the sampled `count`
//! completed. All field accesses use acquire/release ordering, so a reader
//! that observes any part of a later sample also observes its `started` bump
//! and retries.

use core::hint::spin_loop;
use core::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of an [`AtomicStat`].
///
/// `min` and `max` are zero when `count` is zero; use [`StatSnapshot::min`]
/// and friends to tell "no data" apart from a real zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatSnapshot {
    /// Number of samples recorded.
    pub count: u64,
    /// Sum of all samples (wrapping).
    pub total: u64,
    /// Smallest sample, or 0 when empty.
    pub min: u64,
    /// Largest sample, or 0 when empty.
    pub max: u64,
}

impl StatSnapshot {
    /// Snapshot with no samples.
    pub const EMPTY: Self = Self {
        count: 0,
        total: 0,
        min: 0,
        max: 0,
    };

    /// Whether no sample has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Smallest sample, `None` when empty.
    #[must_use]
    pub const fn min(&self) -> Option<u64> {
        if self.is_empty() { None } else { Some(self.min) }
    }

    /// Largest sample, `None` when empty.
    #[must_use]
    pub const fn max(&self) -> Option<u64> {
        if self.is_empty() { None } else { Some(self.max) }
    }

    /// Integer mean (`total / count`), `None` when empty.
    ///
    /// Flooring keeps the mean inside `[min, max]`.
    #[must_use]
    pub const fn mean(&self) -> Option<u64> {
        match self.total.checked_div(self.count) {
            Some(mean) => Some(mean),
            None => None,
        }
    }

    /// Spread between the largest and smallest sample, `None` when empty.
    #[must_use]
    pub const fn range(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.max.saturating_sub(self.min))
        }
    }
}

/// Lock-free min/max/total/count accumulator.
///
/// # RT Safety
///
/// [`AtomicStat::record`] performs a bounded number of atomic operations in
/// the uncontended case and never blocks. Retries only happen when another
/// writer improves the same extremum concurrently.
#[derive(Debug)]
pub struct AtomicStat {
    started: AtomicU64,
    count: AtomicU64,
    total: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Default for AtomicStat {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicStat {
    /// Create an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            started: AtomicU64::new(0),
            count: AtomicU64::new(0),
            total: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    /// Fold one sample into the accumulator.
    #[inline]
    pub fn record(&self, value: u64) {
        self.started.fetch_add(1, Ordering::AcqRel);
        lower_to(&self.min, value);
        raise_to(&self.max, value);
        self.total.fetch_add(value, Ordering::AcqRel);
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of completed samples.
    #[inline]
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Take a consistent snapshot.
    ///
    /// Spins while a writer is in the middle of [`AtomicStat::record`]; the
    /// window is a handful of atomic instructions unless the writer is
    /// preempted.
    #[must_use]
    pub fn snapshot(&self) -> StatSnapshot {
        loop {
            let count = self.count.load(Ordering::Acquire);
            let total = self.total.load(Ordering::Acquire);
            let min = self.min.load(Ordering::Acquire);
            let max = self.max.load(Ordering::Acquire);
            let started = self.started.load(Ordering::Acquire);

            if started == count {
                if count == 0 {
                    return StatSnapshot::EMPTY;
                }
                return StatSnapshot {
                    count,
                    total,
                    min,
                    max,
                };
            }
            spin_loop();
        }
    }
}

/// Lower `target` to `candidate` unless a concurrent writer got there first.
#[inline]
fn lower_to(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Acquire);
    while candidate < current {
        match target.compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Raise `target` to `candidate` unless a concurrent writer got there first.
#[inline]
fn raise_to(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Acquire);
    while candidate > current {
        match target.compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}
