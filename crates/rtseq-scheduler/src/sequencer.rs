//! The sequencer: owns the services, the tick source and the shutdown
//! coordination.
//!
//! Lifecycle: services are added while the sequencer is configuring,
//! [`Sequencer::start_services`] orders them by period and arms the tick
//! source, and [`Sequencer::stop_services`] disarms it, stops and joins
//! every worker. A stopped sequencer cannot be restarted.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rtseq_atomic::TickCounterSnapshot;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{SequencerConfig, ServiceConfig};
use crate::dispatch::Dispatcher;
use crate::error::{SequencerError, SequencerResult};
use crate::platform;
use crate::report::{ServiceReport, StatisticsReport};
use crate::service::Service;
use crate::shutdown::{ShutdownHandle, SignalRegistration};
use crate::timer::{ThreadTimer, TickSource};

/// Lifecycle state of a [`Sequencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequencerState {
    /// Accepting services; not yet started.
    Configuring,
    /// Tick source armed, services being released.
    Running,
    /// Stopped; every worker has been joined.
    Stopped,
}

/// Why [`Sequencer::run_until_shutdown`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The shutdown handle was triggered (signal or explicit request).
    ShutdownRequested,
    /// The time limit elapsed.
    TimeLimit,
}

/// Periodic service sequencer.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use rtseq_scheduler::Sequencer;
///
/// # fn main() -> Result<(), rtseq_scheduler::SequencerError> {
/// let mut sequencer = Sequencer::new();
/// sequencer.add_service("fast", || { /* work */ }, 98, Some(1), 20)?;
/// sequencer.add_service("slow", || { /* work */ }, 97, Some(1), 50)?;
///
/// sequencer.start_services(10)?;
/// sequencer.run_until_shutdown(Some(Duration::from_secs(1)));
/// sequencer.print_statistics();
/// # Ok(())
/// # }
/// ```
pub struct Sequencer {
    config: SequencerConfig,
    services: Vec<Arc<Service>>,
    state: SequencerState,
    tick: Option<Duration>,
    tick_source: Option<Box<dyn TickSource>>,
    final_counters: TickCounterSnapshot,
    shutdown: ShutdownHandle,
    registration: Option<SignalRegistration>,
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("config", &self.config)
            .field("services", &self.services.len())
            .field("state", &self.state)
            .field("tick", &self.tick)
            .field("signals_registered", &self.registration.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Create a sequencer with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(SequencerConfig::default())
    }

    /// Create a sequencer with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(config: SequencerConfig) -> SequencerResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SequencerConfig) -> Self {
        Self {
            config,
            services: Vec::new(),
            state: SequencerState::Configuring,
            tick: None,
            tick_source: None,
            final_counters: TickCounterSnapshot::default(),
            shutdown: ShutdownHandle::new(),
            registration: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Whether the tick source is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == SequencerState::Running
    }

    /// Master tick interval, once started.
    #[must_use]
    pub fn tick(&self) -> Option<Duration> {
        self.tick
    }

    /// Registered services; in dispatch order once started.
    #[must_use]
    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    /// Service with the given name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.iter().find(|service| service.name() == name)
    }

    /// Handle that requests shutdown of this sequencer's supervising loop.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Register a periodic service. The worker thread starts immediately
    /// and waits for its first release.
    ///
    /// `priority <= 0` keeps default OS scheduling for the worker.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::InvalidPeriod`] if `period_ms` is 0; no worker is spawned.
    /// - [`SequencerError::AlreadyStarted`] / [`SequencerError::Stopped`] after start.
    /// - [`SequencerError::WorkerSpawn`] if the OS refuses the thread.
    pub fn add_service<F>(
        &mut self,
        name: impl Into<String>,
        callback: F,
        priority: i32,
        cpu_affinity: Option<usize>,
        period_ms: u64,
    ) -> SequencerResult<Arc<Service>>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_service_with_config(
            ServiceConfig::new(name, priority, cpu_affinity, period_ms),
            callback,
        )
    }

    /// Register a periodic service from a [`ServiceConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`add_service`](Self::add_service).
    pub fn add_service_with_config<F>(
        &mut self,
        config: ServiceConfig,
        callback: F,
    ) -> SequencerResult<Arc<Service>>
    where
        F: FnMut() + Send + 'static,
    {
        self.ensure_configuring()?;

        let service = Arc::new(Service::spawn(
            config,
            Box::new(callback),
            self.config.release_backlog,
        )?);
        self.services.push(Arc::clone(&service));
        Ok(service)
    }

    /// Start releasing services with the default [`ThreadTimer`].
    ///
    /// # Errors
    ///
    /// See [`start_services_with`](Self::start_services_with).
    pub fn start_services(&mut self, tick_ms: u64) -> SequencerResult {
        let timer = ThreadTimer::new(self.config.timer_setup());
        self.start_services_with(tick_ms, timer)
    }

    /// Start releasing services with a custom tick source.
    ///
    /// Services are ordered by ascending period (stable), every service is
    /// first due now with its deadline one period later, and the tick source
    /// is armed. Release instants quantize to multiples of `tick_ms`, which
    /// should not exceed the smallest period.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::InvalidTick`] if `tick_ms` is 0.
    /// - [`SequencerError::AlreadyStarted`] / [`SequencerError::Stopped`].
    /// - [`SequencerError::TimerStart`] if the tick source cannot be armed.
    pub fn start_services_with<T>(&mut self, tick_ms: u64, source: T) -> SequencerResult
    where
        T: TickSource + 'static,
    {
        self.ensure_configuring()?;
        if tick_ms == 0 {
            return Err(SequencerError::InvalidTick);
        }
        let tick = Duration::from_millis(tick_ms);

        if let Some(shortest) = self.services.iter().map(|s| s.config().period_ms).min()
            && tick_ms > shortest
        {
            warn!(
                tick_ms,
                shortest_period_ms = shortest,
                "tick is longer than the shortest period; releases will be skipped"
            );
        }

        self.services.sort_by_key(|service| service.config().period_ms);

        if self.config.lock_memory
            && let Err(err) = platform::lock_process_memory()
        {
            warn!(error = %err, "could not lock process memory; continuing");
        }

        let epoch = Instant::now();
        let dispatcher = Dispatcher::new(&self.services, epoch);
        let mut source: Box<dyn TickSource> = Box::new(source);
        if let Err(err) = source.arm(epoch, tick, dispatcher) {
            error!(error = %err, "tick source failed to start; no service will be released");
            return Err(err);
        }
        self.tick_source = Some(source);
        self.tick = Some(tick);

        if self.config.handle_termination_signals {
            self.registration = SignalRegistration::register(&self.shutdown);
        }

        self.state = SequencerState::Running;
        info!(
            services = self.services.len(),
            tick_ms, "sequencer started"
        );
        Ok(())
    }

    /// Stop the tick source, stop every service and join every worker.
    ///
    /// Idempotent and safe with zero services or before start. In-flight
    /// callbacks complete before their worker exits.
    pub fn stop_services(&mut self) {
        if self.state == SequencerState::Stopped {
            return;
        }

        if let Some(mut source) = self.tick_source.take() {
            source.disarm();
            self.final_counters = source.counters();
        }

        for service in &self.services {
            service.stop();
        }
        for service in &self.services {
            service.join();
        }

        self.registration = None;
        let was_running = self.state == SequencerState::Running;
        self.state = SequencerState::Stopped;
        if was_running {
            info!(services = self.services.len(), "sequencer stopped");
        }
    }

    /// Supervise until shutdown is requested or `limit` elapses, then stop.
    ///
    /// The shutdown flag is polled every `supervisor_poll_ms`; teardown
    /// happens on the calling thread, never in a signal context.
    pub fn run_until_shutdown(&mut self, limit: Option<Duration>) -> StopReason {
        let started = Instant::now();
        let poll = self.config.supervisor_poll();

        let reason = loop {
            if self.shutdown.is_requested() {
                break StopReason::ShutdownRequested;
            }
            let wait = match limit {
                Some(limit) => {
                    let remaining = limit.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        break StopReason::TimeLimit;
                    }
                    remaining.min(poll)
                }
                None => poll,
            };
            thread::sleep(wait);
        };

        info!(?reason, "supervisor stopping sequencer");
        self.stop_services();
        reason
    }

    /// Tick source counters (final values once stopped).
    #[must_use]
    pub fn timer_counters(&self) -> TickCounterSnapshot {
        self.tick_source
            .as_ref()
            .map_or(self.final_counters, |source| source.counters())
    }

    /// Snapshot of every service's statistics.
    #[must_use]
    pub fn statistics(&self) -> StatisticsReport {
        StatisticsReport {
            services: self
                .services
                .iter()
                .map(|service| ServiceReport::from_service(service))
                .collect(),
            timer: self.timer_counters(),
        }
    }

    /// Print the statistics report to stdout.
    pub fn print_statistics(&self) {
        println!("{}", self.statistics());
    }

    fn ensure_configuring(&self) -> SequencerResult {
        match self.state {
            SequencerState::Configuring => Ok(()),
            SequencerState::Running => Err(SequencerError::AlreadyStarted),
            SequencerState::Stopped => Err(SequencerError::Stopped),
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop_services();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SequencerResult<Sequencer> {
        Sequencer::with_config(
            SequencerConfig::builder()
                .handle_termination_signals(false)
                .supervisor_poll_ms(1)
                .build()?,
        )
    }

    #[test]
    fn test_new_sequencer_is_configuring() {
        let sequencer = Sequencer::new();
        assert_eq!(sequencer.state(), SequencerState::Configuring);
        assert!(!sequencer.is_running());
        assert!(sequencer.services().is_empty());
        assert_eq!(sequencer.tick(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SequencerConfig {
            release_backlog: 0,
            ..SequencerConfig::default()
        };
        assert!(matches!(
            Sequencer::with_config(config),
            Err(SequencerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_period_rejected_without_registration() -> SequencerResult {
        let mut sequencer = quiet()?;
        let result = sequencer.add_service("zero", || {}, 0, None, 0);
        assert!(matches!(result, Err(SequencerError::InvalidPeriod { .. })));
        assert!(sequencer.services().is_empty());
        Ok(())
    }

    #[test]
    fn test_stop_before_start_with_no_services() -> SequencerResult {
        let mut sequencer = quiet()?;
        let started = Instant::now();
        sequencer.stop_services();
        sequencer.stop_services();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(sequencer.state(), SequencerState::Stopped);
        Ok(())
    }

    #[test]
    fn test_start_sorts_by_period_stably() -> SequencerResult {
        let mut sequencer = quiet()?;
        sequencer.add_service("slow", || {}, 0, None, 50)?;
        sequencer.add_service("fast-a", || {}, 0, None, 20)?;
        sequencer.add_service("fast-b", || {}, 0, None, 20)?;

        sequencer.start_services(10)?;
        let order: Vec<&str> = sequencer.services().iter().map(|s| s.name()).collect();
        assert_eq!(order, vec!["fast-a", "fast-b", "slow"]);
        assert_eq!(sequencer.tick(), Some(Duration::from_millis(10)));
        sequencer.stop_services();
        Ok(())
    }

    #[test]
    fn test_lifecycle_errors() -> SequencerResult {
        let mut sequencer = quiet()?;
        assert!(matches!(
            sequencer.start_services(0),
            Err(SequencerError::InvalidTick)
        ));

        sequencer.start_services(5)?;
        assert!(sequencer.is_running());
        assert!(matches!(
            sequencer.add_service("late", || {}, 0, None, 10),
            Err(SequencerError::AlreadyStarted)
        ));
        assert!(matches!(
            sequencer.start_services(5),
            Err(SequencerError::AlreadyStarted)
        ));

        sequencer.stop_services();
        assert!(matches!(
            sequencer.start_services(5),
            Err(SequencerError::Stopped)
        ));
        assert!(matches!(
            sequencer.add_service("later", || {}, 0, None, 10),
            Err(SequencerError::Stopped)
        ));
        Ok(())
    }

    #[test]
    fn test_run_until_shutdown_time_limit() -> SequencerResult {
        let mut sequencer = quiet()?;
        sequencer.add_service("svc", || {}, 0, None, 5)?;
        sequencer.start_services(5)?;

        let reason = sequencer.run_until_shutdown(Some(Duration::from_millis(30)));
        assert_eq!(reason, StopReason::TimeLimit);
        assert_eq!(sequencer.state(), SequencerState::Stopped);
        assert!(sequencer.timer_counters().ticks > 0);
        Ok(())
    }

    #[test]
    fn test_run_until_shutdown_requested() -> SequencerResult {
        let mut sequencer = quiet()?;
        sequencer.start_services(5)?;

        let handle = sequencer.shutdown_handle();
        let requester = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.request();
        });

        let reason = sequencer.run_until_shutdown(None);
        assert_eq!(reason, StopReason::ShutdownRequested);
        assert!(requester.join().is_ok());
        assert_eq!(sequencer.state(), SequencerState::Stopped);
        Ok(())
    }

    #[test]
    fn test_statistics_in_dispatch_order() -> SequencerResult {
        let mut sequencer = quiet()?;
        sequencer.add_service("b", || {}, 0, Some(0), 40)?;
        sequencer.add_service("a", || {}, 0, None, 10)?;
        sequencer.start_services(10)?;
        sequencer.stop_services();

        let report = sequencer.statistics();
        let names: Vec<&str> = report.services.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(report.service("b").and_then(|r| r.cpu_affinity), Some(0));
        Ok(())
    }

    #[test]
    fn test_debug_output() {
        let text = format!("{:?}", Sequencer::new());
        assert!(text.contains("Configuring"));
    }
}
