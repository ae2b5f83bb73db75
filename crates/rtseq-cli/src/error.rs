//! Error types for the rtseq CLI

use rtseq_scheduler::SequencerError;
use thiserror::Error;

/// Exit code for configuration and schedule errors.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for any other failure.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid service spec '{spec}': {reason}")]
    InvalidServiceSpec { spec: String, reason: String },

    #[error("No services configured; pass --config FILE or --service NAME:PERIOD_MS:PRIORITY")]
    NoServices,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

impl CliError {
    pub fn invalid_spec(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidServiceSpec {
            spec: spec.to_owned(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from the schedule rather than the run.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Sequencer(err) => err.is_config_error(),
            Self::InvalidServiceSpec { .. }
            | Self::NoServices
            | Self::InvalidConfiguration(_)
            | Self::IoError(_)
            | Self::JsonError(_)
            | Self::YamlError(_) => true,
        }
    }
}

/// Map an error chain to the process exit code.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    let config = match (
        error.downcast_ref::<CliError>(),
        error.downcast_ref::<SequencerError>(),
    ) {
        (Some(err), _) => err.is_config_error(),
        (None, Some(err)) => err.is_config_error(),
        (None, None) => false,
    };
    if config { EXIT_CONFIG } else { EXIT_FAILURE }
}
