//! Periodic real-time service sequencer.
//!
//! This crate releases a set of independent periodic callbacks ("services")
//! from one shared master tick. Each service runs on its own worker thread
//! with the requested priority and CPU affinity, and records execution time,
//! execution-time jitter, release jitter and deadline misses. It includes:
//!
//! - **Sequencer**: registration, start/stop lifecycle, supervision and reporting
//! - **Service**: one callback, its bounded lock-free release queue and its worker thread
//! - **Dispatcher**: the per-tick release decision, in ascending-period order
//! - **TickSource / ThreadTimer**: the master tick, sleeping to absolute instants
//! - **ShutdownHandle**: termination signals routed to the active sequencer
//! - **RtSetup**: real-time thread configuration
//!
//! # RT-Safety Guarantees
//!
//! - The dispatch path allocates nothing, takes no locks and does no I/O;
//!   a release is a lock-free ring push plus a thread unpark
//! - Releases never block; a full backlog drops the release and counts it
//! - Statistics are lock-free and snapshots are always consistent
//! - A panicking callback is contained to its own service
//!
//! # Timing model
//!
//! All services share one tick of `tick_ms`, so release instants quantize to
//! multiples of it. Choose a tick that divides every period and does not
//! exceed the shortest one. A release's deadline is the next release
//! boundary (scheduled instant plus one period).
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rtseq_scheduler::{Sequencer, SequencerConfig};
//!
//! # fn main() -> Result<(), rtseq_scheduler::SequencerError> {
//! let config = SequencerConfig::builder().timer_priority(99).build()?;
//! let mut sequencer = Sequencer::with_config(config)?;
//!
//! sequencer.add_service("control", || { /* 50 Hz work */ }, 98, Some(1), 20)?;
//! sequencer.add_service("telemetry", || { /* 20 Hz work */ }, 97, Some(1), 50)?;
//!
//! sequencer.start_services(10)?;
//! let reason = sequencer.run_until_shutdown(Some(Duration::from_secs(10)));
//! println!("stopped: {reason:?}");
//! sequencer.print_statistics();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod report;
pub mod rt_setup;
pub mod sequencer;
pub mod service;
pub mod shutdown;
pub mod timer;

mod platform;

pub mod prelude;

pub use config::{MAX_RELEASE_BACKLOG, SequencerConfig, SequencerConfigBuilder, ServiceConfig};
pub use dispatch::Dispatcher;
pub use error::{PlatformError, SequencerError, SequencerResult};
pub use report::{ServiceReport, StatisticsReport};
pub use rt_setup::{AppliedSetup, RtSetup, max_realtime_priority, rate_monotonic_priorities};
pub use rtseq_atomic::{ServiceStats, ServiceStatsSnapshot, StatSnapshot, TickCounterSnapshot};
pub use sequencer::{Sequencer, SequencerState, StopReason};
pub use service::{ReleaseOutcome, ReleaseStamp, Service, ServiceFn};
pub use shutdown::{
    ShutdownHandle, TERMINATED_EXIT_CODE, has_active_sequencer, request_active_shutdown,
};
pub use timer::{ThreadTimer, TickSource};
