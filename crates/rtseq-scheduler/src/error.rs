//! Error types for the sequencer crate.
//!
//! [`SequencerError`] covers registration, lifecycle and timer failures.
//! [`PlatformError`] covers thread attribute and sleep failures reported by
//! the OS layer. Those are logged by the thread that hit them and never
//! fail an operation; the type is `Copy` so worker threads can log it
//! without allocating.

use std::io;

use thiserror::Error;

/// Failure reported by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The OS refused the requested scheduling priority.
    #[error("failed to set thread priority {requested} (os error {code})")]
    Priority {
        /// Priority that was requested after clamping.
        requested: i32,
        /// Raw OS error code.
        code: i32,
    },

    /// The OS refused to pin the thread to the requested core.
    #[error("failed to pin thread to cpu {core} (os error {code})")]
    Affinity {
        /// Core index that was requested.
        core: usize,
        /// Raw OS error code.
        code: i32,
    },

    /// The requested core index cannot be expressed on this platform.
    #[error("cpu {core} is outside the supported affinity range")]
    AffinityOutOfRange {
        /// Core index that was requested.
        core: usize,
    },

    /// Locking process memory failed.
    #[error("failed to lock process memory (os error {code})")]
    LockMemory {
        /// Raw OS error code.
        code: i32,
    },

    /// The high-precision sleep returned an error.
    #[error("high-precision sleep failed (os error {code})")]
    Sleep {
        /// Raw OS error code.
        code: i32,
    },

    /// The operation is not available on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl PlatformError {
    /// Raw OS error code, if the failure came from the OS.
    #[must_use]
    pub const fn os_code(&self) -> Option<i32> {
        match self {
            Self::Priority { code, .. }
            | Self::Affinity { code, .. }
            | Self::LockMemory { code }
            | Self::Sleep { code } => Some(*code),
            Self::AffinityOutOfRange { .. } | Self::Unsupported(_) => None,
        }
    }
}

/// Errors returned by the sequencer and its services.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// A service was registered with a zero period.
    #[error("service '{name}' has an invalid period: period_ms must be greater than 0")]
    InvalidPeriod {
        /// Name of the rejected service.
        name: String,
    },

    /// The master tick interval was zero.
    #[error("tick interval must be greater than 0 ms")]
    InvalidTick,

    /// The operation is only valid before `start_services`.
    #[error("sequencer is already running")]
    AlreadyStarted,

    /// The sequencer has been stopped and cannot be reused.
    #[error("sequencer has been stopped")]
    Stopped,

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker for service '{name}'")]
    WorkerSpawn {
        /// Name of the service whose worker could not be created.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The tick source could not be armed; no service would ever be released.
    #[error("failed to start the tick source")]
    TimerStart {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SequencerError {
    /// Create an invalid period error.
    #[must_use]
    pub fn invalid_period(name: impl Into<String>) -> Self {
        Self::InvalidPeriod { name: name.into() }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Whether the error was caused by the caller's configuration rather than
    /// the runtime environment.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPeriod { .. } | Self::InvalidTick | Self::InvalidConfig(_)
        )
    }
}

/// Result type for sequencer operations.
pub type SequencerResult<T = ()> = Result<T, SequencerError>;
