//! Tick sources driving the dispatcher.
//!
//! A [`TickSource`] receives the [`Dispatcher`] when the sequencer starts and
//! calls [`Dispatcher::on_tick`] at a fixed granularity until disarmed.
//! [`ThreadTimer`] is the default: one dedicated thread sleeping to absolute
//! instants `epoch + k * tick` with the platform high-precision sleep.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtseq_atomic::{TickCounterSnapshot, TickCounters};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{SequencerError, SequencerResult};
use crate::platform::PlatformSleep;
use crate::rt_setup::RtSetup;

/// Periodic notification source for the dispatcher.
pub trait TickSource: Send {
    /// Start delivering ticks. The first tick is due at `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::TimerStart`] if the source cannot run; no
    /// service would ever be released in that case.
    fn arm(&mut self, epoch: Instant, tick: Duration, dispatcher: Dispatcher) -> SequencerResult;

    /// Stop delivering ticks. After return `on_tick` is no longer called.
    /// Must be idempotent.
    fn disarm(&mut self);

    /// Tick and overrun counts so far.
    fn counters(&self) -> TickCounterSnapshot {
        TickCounterSnapshot::default()
    }
}

/// Default tick source: a dedicated thread with absolute-deadline sleeps.
#[derive(Debug)]
pub struct ThreadTimer {
    setup: RtSetup,
    running: Arc<AtomicBool>,
    counters: Arc<TickCounters>,
    handle: Option<JoinHandle<()>>,
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new(RtSetup::minimal())
    }
}

impl ThreadTimer {
    /// Create a timer whose thread applies `setup` on start.
    #[must_use]
    pub fn new(setup: RtSetup) -> Self {
        Self {
            setup,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(TickCounters::new()),
            handle: None,
        }
    }

    /// Whether the timer thread is running.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl TickSource for ThreadTimer {
    fn arm(&mut self, epoch: Instant, tick: Duration, dispatcher: Dispatcher) -> SequencerResult {
        if self.handle.is_some() {
            return Err(SequencerError::TimerStart {
                source: io::Error::new(io::ErrorKind::AlreadyExists, "timer already armed"),
            });
        }
        if tick.is_zero() {
            return Err(SequencerError::InvalidTick);
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let counters = Arc::clone(&self.counters);
        let setup = self.setup;

        let spawned = thread::Builder::new()
            .name("rtseq-timer".to_string())
            .spawn(move || run_timer(epoch, tick, dispatcher, &running, &counters, setup));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                info!(tick_us = tick.as_micros(), "timer armed");
                Ok(())
            }
            Err(source) => {
                self.running.store(false, Ordering::Release);
                Err(SequencerError::TimerStart { source })
            }
        }
    }

    fn disarm(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("timer thread terminated abnormally");
            }
            let counters = self.counters.snapshot();
            info!(
                ticks = counters.ticks,
                overruns = counters.overruns,
                "timer disarmed"
            );
        }
    }

    fn counters(&self) -> TickCounterSnapshot {
        self.counters.snapshot()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn run_timer(
    epoch: Instant,
    tick: Duration,
    mut dispatcher: Dispatcher,
    running: &AtomicBool,
    counters: &TickCounters,
    setup: RtSetup,
) {
    setup.apply("rtseq-timer");
    let mut sleep = PlatformSleep::new();
    let mut sleep_failed = false;
    let mut next = epoch;

    while running.load(Ordering::Acquire) {
        if let Err(err) = sleep.sleep_until(next) {
            if !sleep_failed {
                warn!(error = %err, "high-precision sleep failed; ticks may be late");
                sleep_failed = true;
            }
            std::thread::sleep(next.saturating_duration_since(Instant::now()));
        }
        if !running.load(Ordering::Acquire) {
            break;
        }

        dispatcher.on_tick(Instant::now());
        counters.inc_tick();

        let (following, overruns) = next_tick(next, tick, Instant::now());
        if overruns > 0 {
            counters.inc_overrun_by(overruns);
        }
        next = following;
    }

    debug!(services = dispatcher.len(), "timer thread exiting");
}

/// Next tick instant after one delivered at `current`.
///
/// When the source has fallen behind, ticks whose instants already passed
/// are coalesced into one immediate tick on the latest passed grid point and
/// the rest counted as overruns.
fn next_tick(current: Instant, tick: Duration, now: Instant) -> (Instant, u64) {
    let next = current + tick;
    if next > now {
        return (next, 0);
    }

    let behind = now.saturating_duration_since(next);
    let skipped = behind.as_nanos() / tick.as_nanos().max(1);
    let step = u32::try_from(skipped).ok().and_then(|n| tick.checked_mul(n));
    match step {
        Some(step) => (next + step, u64::try_from(skipped).unwrap_or(u64::MAX)),
        None => (now, u64::MAX),
    }
}
