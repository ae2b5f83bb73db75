//! Tick dispatch: decides which services are due and releases them.
//!
//! The [`Dispatcher`] is owned by the tick source and is the only code that
//! reads or writes the per-service schedule (next release, next deadline).
//!
//! # Algorithm
//!
//! Entries are kept in ascending-period order (ties in registration order).
//! The dispatcher caches the earliest next-release over all entries. A tick
//! before that horizon returns after a single comparison. A tick at or past
//! the horizon scans every entry in order, releasing the due ones and
//! recomputing the horizon in the same pass.
//!
//! A due entry is released once, stamped with its scheduled release and
//! deadline. Its next release then advances by one period, and past `now`
//! if whole periods were missed; the missed periods are counted, never
//! replayed.
//!
//! # RT Safety
//!
//! [`Dispatcher::on_tick`] allocates nothing, takes no locks and does no
//! I/O. A release is a push onto the service's lock-free ring followed by a
//! thread unpark.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::service::{ReleaseStamp, Service};

#[derive(Debug)]
struct ScheduleEntry {
    service: Arc<Service>,
    period: Duration,
    next_release: Instant,
    next_deadline: Instant,
}

impl ScheduleEntry {
    fn release(&mut self, now: Instant) {
        let stamp = ReleaseStamp {
            scheduled: self.next_release,
            deadline: self.next_deadline,
        };
        // Dropped and stopped outcomes are accounted for by the service.
        let _outcome = self.service.release_at(stamp);

        let skipped = self.advance_past(now);
        if skipped > 0 {
            self.service.stats().record_skipped_periods(skipped);
        }
        self.next_deadline = self.next_release + self.period;
    }

    /// Move `next_release` to the first grid point after `now`. Returns the
    /// number of whole periods skipped beyond the normal single step.
    fn advance_past(&mut self, now: Instant) -> u64 {
        let behind = now.saturating_duration_since(self.next_release);
        let periods = behind.as_nanos() / self.period.as_nanos().max(1) + 1;

        match u32::try_from(periods)
            .ok()
            .and_then(|n| self.period.checked_mul(n))
        {
            Some(step) => self.next_release += step,
            None => self.next_release = now + self.period,
        }

        u64::try_from(periods.saturating_sub(1)).unwrap_or(u64::MAX)
    }
}

/// Release schedule for a set of services sharing one tick.
#[derive(Debug)]
pub struct Dispatcher {
    entries: Vec<ScheduleEntry>,
    horizon: Option<Instant>,
}

impl Dispatcher {
    /// Build a schedule with every service first due at `epoch`.
    ///
    /// `services` must already be in dispatch order.
    pub(crate) fn new(services: &[Arc<Service>], epoch: Instant) -> Self {
        let entries: Vec<ScheduleEntry> = services
            .iter()
            .map(|service| {
                let period = service.period();
                ScheduleEntry {
                    service: Arc::clone(service),
                    period,
                    next_release: epoch,
                    next_deadline: epoch + period,
                }
            })
            .collect();

        let horizon = (!entries.is_empty()).then_some(epoch);
        Self { entries, horizon }
    }

    /// Evaluate the schedule at `now`, releasing every due service in
    /// dispatch order. Returns the number of services released.
    pub fn on_tick(&mut self, now: Instant) -> usize {
        match self.horizon {
            Some(horizon) if now >= horizon => {}
            _ => return 0,
        }

        let mut released = 0;
        let mut horizon: Option<Instant> = None;
        for entry in &mut self.entries {
            if entry.next_release <= now {
                entry.release(now);
                released += 1;
            }
            horizon = Some(horizon.map_or(entry.next_release, |h| h.min(entry.next_release)));
        }
        self.horizon = horizon;
        released
    }

    /// Earliest instant at which any service is due.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.horizon
    }

    /// Number of scheduled services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schedule is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Service names in dispatch order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.service.name())
    }
}
