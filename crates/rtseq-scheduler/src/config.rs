//! Service and sequencer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SequencerError, SequencerResult};
use crate::rt_setup::RtSetup;

/// Largest release backlog a service may buffer.
pub const MAX_RELEASE_BACKLOG: usize = 1024;

/// Configuration of one periodic service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Diagnostic name, also used as the worker thread name.
    pub name: String,
    /// Requested real-time priority; `<= 0` keeps default scheduling.
    pub priority: i32,
    /// Core to pin the worker to (None = no affinity).
    #[serde(default)]
    pub cpu_affinity: Option<usize>,
    /// Release period in milliseconds; must be greater than 0.
    pub period_ms: u64,
}

impl ServiceConfig {
    /// Create a service configuration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        cpu_affinity: Option<usize>,
        period_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            cpu_affinity,
            period_ms,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::InvalidPeriod`] if `period_ms` is 0.
    pub fn validate(&self) -> SequencerResult {
        if self.period_ms == 0 {
            return Err(SequencerError::invalid_period(&self.name));
        }
        Ok(())
    }

    /// Release period.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Thread setup the worker applies on entry.
    #[must_use]
    pub fn rt_setup(&self) -> RtSetup {
        RtSetup {
            priority: Some(self.priority),
            cpu_affinity: self.cpu_affinity,
        }
    }
}

/// Sequencer-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Releases a service may have pending before new ones are dropped.
    pub release_backlog: usize,
    /// Route SIGINT/SIGTERM to this sequencer's shutdown handle while it runs.
    pub handle_termination_signals: bool,
    /// Lock process memory when services start.
    pub lock_memory: bool,
    /// Real-time priority of the timer thread.
    pub timer_priority: Option<i32>,
    /// Core to pin the timer thread to.
    pub timer_cpu_affinity: Option<usize>,
    /// Shutdown flag polling interval of `run_until_shutdown` (milliseconds).
    pub supervisor_poll_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            release_backlog: 1,
            handle_termination_signals: true,
            lock_memory: false,
            timer_priority: None,
            timer_cpu_affinity: None,
            supervisor_poll_ms: 10,
        }
    }
}

impl SequencerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> SequencerResult {
        if self.release_backlog == 0 {
            return Err(SequencerError::invalid_config(
                "release_backlog must be greater than 0",
            ));
        }
        if self.release_backlog > MAX_RELEASE_BACKLOG {
            return Err(SequencerError::invalid_config(format!(
                "release_backlog must be at most {MAX_RELEASE_BACKLOG}"
            )));
        }
        if self.supervisor_poll_ms == 0 {
            return Err(SequencerError::invalid_config(
                "supervisor_poll_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Thread setup for the timer thread.
    #[must_use]
    pub fn timer_setup(&self) -> RtSetup {
        RtSetup {
            priority: self.timer_priority,
            cpu_affinity: self.timer_cpu_affinity,
        }
    }

    /// Supervisor polling interval.
    #[must_use]
    pub fn supervisor_poll(&self) -> Duration {
        Duration::from_millis(self.supervisor_poll_ms)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> SequencerConfigBuilder {
        SequencerConfigBuilder::default()
    }
}

/// Builder for `SequencerConfig`.
#[derive(Debug, Default)]
pub struct SequencerConfigBuilder {
    config: SequencerConfig,
}

impl SequencerConfigBuilder {
    /// Set the per-service release backlog.
    #[must_use]
    pub fn release_backlog(mut self, backlog: usize) -> Self {
        self.config.release_backlog = backlog;
        self
    }

    /// Enable or disable termination signal routing.
    #[must_use]
    pub fn handle_termination_signals(mut self, enabled: bool) -> Self {
        self.config.handle_termination_signals = enabled;
        self
    }

    /// Enable or disable memory locking at start.
    #[must_use]
    pub fn lock_memory(mut self, enabled: bool) -> Self {
        self.config.lock_memory = enabled;
        self
    }

    /// Set the timer thread's real-time priority.
    #[must_use]
    pub fn timer_priority(mut self, priority: i32) -> Self {
        self.config.timer_priority = Some(priority);
        self
    }

    /// Pin the timer thread to a core.
    #[must_use]
    pub fn timer_cpu_affinity(mut self, core: usize) -> Self {
        self.config.timer_cpu_affinity = Some(core);
        self
    }

    /// Set the supervisor polling interval in milliseconds.
    #[must_use]
    pub fn supervisor_poll_ms(mut self, ms: u64) -> Self {
        self.config.supervisor_poll_ms = ms;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> SequencerResult<SequencerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_zero_period_rejected() {
        let config = ServiceConfig::new("bad", 10, None, 0);
        assert!(matches!(
            config.validate(),
            Err(SequencerError::InvalidPeriod { ref name }) if name == "bad"
        ));
    }

    #[test]
    fn test_service_config_accessors() {
        let config = ServiceConfig::new("X", 98, Some(1), 20);
        assert!(config.validate().is_ok());
        assert_eq!(config.period(), Duration::from_millis(20));
        assert_eq!(config.rt_setup(), RtSetup::new().with_priority(98).with_cpu_affinity(1));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SequencerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.release_backlog, 1);
        assert!(config.handle_termination_signals);
        assert_eq!(config.supervisor_poll(), Duration::from_millis(10));
    }

    #[test]
    fn test_builder_validates() {
        assert!(SequencerConfig::builder().release_backlog(0).build().is_err());
        assert!(
            SequencerConfig::builder()
                .release_backlog(MAX_RELEASE_BACKLOG + 1)
                .build()
                .is_err()
        );
        assert!(SequencerConfig::builder().supervisor_poll_ms(0).build().is_err());
    }

    #[test]
    fn test_builder_sets_fields() -> TestResult {
        let config = SequencerConfig::builder()
            .release_backlog(4)
            .handle_termination_signals(false)
            .lock_memory(true)
            .timer_priority(99)
            .timer_cpu_affinity(0)
            .supervisor_poll_ms(5)
            .build()?;

        assert_eq!(config.release_backlog, 4);
        assert!(!config.handle_termination_signals);
        assert!(config.lock_memory);
        assert_eq!(
            config.timer_setup(),
            RtSetup::new().with_priority(99).with_cpu_affinity(0)
        );
        Ok(())
    }

    #[test]
    fn test_yaml_defaults_fill_missing_fields() -> TestResult {
        let config: SequencerConfig = serde_yaml::from_str("release_backlog: 2\n")?;
        assert_eq!(config.release_backlog, 2);
        assert!(config.handle_termination_signals);
        assert_eq!(config.supervisor_poll_ms, 10);

        let service: ServiceConfig =
            serde_yaml::from_str("name: X\npriority: 98\nperiod_ms: 20\n")?;
        assert_eq!(service, ServiceConfig::new("X", 98, None, 20));
        Ok(())
    }

    #[test]
    fn test_json_service_config() -> TestResult {
        let service: ServiceConfig = serde_json::from_str(
            r#"{"name":"Y","priority":97,"cpu_affinity":2,"period_ms":50}"#,
        )?;
        assert_eq!(service, ServiceConfig::new("Y", 97, Some(2), 50));
        Ok(())
    }
}
