//! # rtseq-atomic
//!
//! Lock-free statistics primitives for periodic real-time services.
//!
//! Each service run by the sequencer owns one [`ServiceStats`] aggregator. The
//! aggregator is written by the service's worker thread and read concurrently
//! by the reporting path, so every update is built from atomic operations
//! instead of a mutex.
//!
//! ## Safety Guarantees
//!
//! - **No heap allocations** anywhere in the crate
//! - **No blocking operations** on the write path
//! - **Consistent snapshots**: readers never observe a total that disagrees
//!   with its sample count, so `min <= mean <= max` always holds
//!
//! ## Architecture
//!
//! - [`stat`] - [`AtomicStat`], a min/max/total/count accumulator for one quantity
//! - [`stats`] - [`ServiceStats`], the per-service aggregator built from it
//! - [`counters`] - [`TickCounters`], counters kept by the tick source
//!
//! ## Usage
//!
//! ```rust
//! use rtseq_atomic::ServiceStats;
//!
//! let stats = ServiceStats::new();
//!
//! // Worker thread, once per release.
//! stats.record_release_jitter(12_000);
//! stats.record_execution(1_500_000);
//!
//! // Reporting path.
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.releases(), 1);
//! assert_eq!(snapshot.execution_jitter.count, 0);
//! ```

#![no_std]
#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod counters;
pub mod stat;
pub mod stats;

pub mod prelude;

pub use counters::{TickCounterSnapshot, TickCounters};
pub use stat::{AtomicStat, StatSnapshot};
pub use stats::{ServiceStats, ServiceStatsSnapshot};
