//! Prelude module for common sequencer types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the sequencer crate.

pub use crate::config::{SequencerConfig, ServiceConfig};
pub use crate::error::{SequencerError, SequencerResult};
pub use crate::report::StatisticsReport;
pub use crate::rt_setup::{RtSetup, rate_monotonic_priorities};
pub use crate::sequencer::{Sequencer, StopReason};
pub use crate::service::Service;
pub use crate::shutdown::ShutdownHandle;
pub use crate::timer::{ThreadTimer, TickSource};
