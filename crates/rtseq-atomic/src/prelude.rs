//! Prelude for rtseq-atomic.
//!
//! # Example
//!
//! ```rust
//! use rtseq_atomic::prelude::*;
//!
//! let stats = ServiceStats::new();
//! stats.record_execution(250_000);
//! let snapshot: ServiceStatsSnapshot = stats.snapshot();
//! assert_eq!(snapshot.execution.mean(), Some(250_000));
//! ```

pub use crate::counters::{TickCounterSnapshot, TickCounters};
pub use crate::stat::{AtomicStat, StatSnapshot};
pub use crate::stats::{ServiceStats, ServiceStatsSnapshot};
