//! Periodic service and its dedicated worker thread.
//!
//! A [`Service`] owns one callback, the release queue feeding its worker
//! and the worker's statistics. The dispatcher releases it through
//! [`Service::release_at`]; the worker parks while the queue is empty, runs
//! the callback once per release and records timing.
//!
//! # Release protocol
//!
//! - The queue is a lock-free ring bounded by the sequencer's release
//!   backlog. A release that finds it full is dropped and counted.
//! - A release pushes its stamp and unparks the worker. Neither step takes
//!   a lock or blocks the caller.
//! - [`Service::stop`] clears the running flag first and then unparks the
//!   worker, so a worker that wakes for any reason after shutdown exits
//!   without running the callback.
//! - An in-flight callback always completes before the worker observes
//!   shutdown.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use rtseq_atomic::{ServiceStats, ServiceStatsSnapshot};
use tracing::{debug, error, trace};

use crate::config::ServiceConfig;
use crate::error::{SequencerError, SequencerResult};

/// Callback executed once per release.
pub type ServiceFn = Box<dyn FnMut() + Send + 'static>;

/// Scheduled instants carried by one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseStamp {
    /// Instant the release was due.
    pub scheduled: Instant,
    /// Completion after this instant is a deadline miss.
    pub deadline: Instant,
}

impl ReleaseStamp {
    /// Stamp for a release due at `scheduled` with a one-period deadline.
    #[must_use]
    pub fn new(scheduled: Instant, period: Duration) -> Self {
        Self {
            scheduled,
            deadline: scheduled + period,
        }
    }
}

/// Result of a release attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The release was queued for the worker.
    Queued,
    /// The backlog was full; the release was dropped and counted.
    Dropped,
    /// The service has been stopped; nothing happened.
    Stopped,
}

#[derive(Debug)]
struct ServiceCore {
    config: ServiceConfig,
    period: Duration,
    running: AtomicBool,
    pending: ArrayQueue<ReleaseStamp>,
    stats: ServiceStats,
}

impl ServiceCore {
    fn new(config: ServiceConfig, backlog: usize) -> Self {
        Self {
            period: config.period(),
            config,
            running: AtomicBool::new(true),
            pending: ArrayQueue::new(backlog.max(1)),
            stats: ServiceStats::new(),
        }
    }
}

/// One periodic service.
///
/// Created by [`Sequencer::add_service`](crate::Sequencer::add_service). The
/// worker thread is spawned immediately and blocks until the first release.
#[derive(Debug)]
pub struct Service {
    core: Arc<ServiceCore>,
    worker_thread: Option<Thread>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Service {
    /// Validate `config` and spawn the worker.
    pub(crate) fn spawn(
        config: ServiceConfig,
        callback: ServiceFn,
        backlog: usize,
    ) -> SequencerResult<Self> {
        config.validate()?;

        let core = Arc::new(ServiceCore::new(config, backlog));

        let worker_core = Arc::clone(&core);
        let handle = thread::Builder::new()
            .name(thread_name(&core.config.name))
            .spawn(move || worker_loop(&worker_core, callback))
            .map_err(|source| SequencerError::WorkerSpawn {
                name: core.config.name.clone(),
                source,
            })?;

        debug!(
            service = %core.config.name,
            period_ms = core.config.period_ms,
            priority = core.config.priority,
            "service registered"
        );

        Ok(Self {
            core,
            worker_thread: Some(handle.thread().clone()),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Service without a worker; the caller drains the release queue.
    #[cfg(test)]
    pub(crate) fn detached(config: ServiceConfig, backlog: usize) -> Self {
        Self {
            core: Arc::new(ServiceCore::new(config, backlog)),
            worker_thread: None,
            worker: Mutex::new(None),
        }
    }

    /// Pop every pending release of a detached service.
    #[cfg(test)]
    pub(crate) fn drain_releases(&self) -> Vec<ReleaseStamp> {
        std::iter::from_fn(|| self.core.pending.pop()).collect()
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.config.name
    }

    /// Configuration the service was created with.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.core.config
    }

    /// Release period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.core.period
    }

    /// Whether the service still accepts releases.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Whether the worker has been joined (or never existed).
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.worker.lock().is_none()
    }

    /// Live statistics.
    #[must_use]
    pub fn stats(&self) -> &ServiceStats {
        &self.core.stats
    }

    /// Consistent snapshot of the statistics.
    #[must_use]
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        self.core.stats.snapshot()
    }

    /// Release the service now, with a deadline one period away.
    ///
    /// Has no effect after [`stop`](Self::stop).
    pub fn release(&self) -> ReleaseOutcome {
        self.release_at(ReleaseStamp::new(Instant::now(), self.core.period))
    }

    /// Release the service with an explicit stamp.
    ///
    /// Lock-free and never blocks. A full backlog drops the release and
    /// counts it.
    pub fn release_at(&self, stamp: ReleaseStamp) -> ReleaseOutcome {
        if !self.is_running() {
            return ReleaseOutcome::Stopped;
        }
        if self.core.pending.push(stamp).is_err() {
            self.core.stats.record_dropped_release();
            return ReleaseOutcome::Dropped;
        }
        self.wake_worker();
        ReleaseOutcome::Queued
    }

    /// Stop accepting releases and wake the worker so it can exit.
    ///
    /// Idempotent; only the first call wakes the worker.
    pub fn stop(&self) {
        if self.core.running.swap(false, Ordering::AcqRel) {
            self.wake_worker();
        }
    }

    fn wake_worker(&self) {
        if let Some(thread) = &self.worker_thread {
            thread.unpark();
        }
    }

    /// Join the worker thread. Idempotent.
    ///
    /// Only waits once [`stop`](Self::stop) has been called, since a running
    /// worker never exits on its own.
    pub fn join(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            debug!(service = %self.core.config.name, "join requested from own worker; detaching");
            return;
        }

        if handle.join().is_err() {
            error!(service = %self.core.config.name, "worker thread terminated abnormally");
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn thread_name(service: &str) -> String {
    service.chars().filter(|&c| c != '\0').collect()
}

fn worker_loop(core: &ServiceCore, mut callback: ServiceFn) {
    let name = core.config.name.as_str();
    let applied = core.config.rt_setup().apply(name);
    debug!(service = name, complete = applied.is_complete(), "worker started");

    // An unpark that lands before `park` leaves a token, so no release is lost.
    while core.running.load(Ordering::Acquire) {
        match core.pending.pop() {
            Some(stamp) => core.execute(stamp, &mut callback),
            None => thread::park(),
        }
    }

    debug!(service = name, "worker exiting");
}

impl ServiceCore {
    fn execute(&self, stamp: ReleaseStamp, callback: &mut ServiceFn) {
        let woke = Instant::now();
        self.stats
            .record_release_jitter(duration_ns(woke.saturating_duration_since(stamp.scheduled)));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback()));

        let finished = Instant::now();
        self.stats
            .record_execution(duration_ns(finished.saturating_duration_since(woke)));

        if let Err(payload) = outcome {
            self.stats.record_fault();
            error!(
                service = %self.config.name,
                panic = panic_message(payload.as_ref()),
                "service callback panicked; worker keeps running"
            );
        }

        if let Some(lateness) = finished
            .checked_duration_since(stamp.deadline)
            .filter(|late| !late.is_zero())
        {
            self.stats.record_deadline_miss(duration_ns(lateness));
            trace!(service = %self.config.name, lateness_ns = duration_ns(lateness), "deadline missed");
        }
    }
}

pub(crate) fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
