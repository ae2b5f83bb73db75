//! Statistics report.
//!
//! [`StatisticsReport`] is a read-only snapshot of every service plus the
//! tick source counters. It serializes with serde and renders as text via
//! `Display`; empty quantities render as `no data`.

use std::fmt;

use rtseq_atomic::{ServiceStatsSnapshot, StatSnapshot, TickCounterSnapshot};
use serde::Serialize;

use crate::service::Service;

/// Report entry for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    /// Service name.
    pub name: String,
    /// Release period in milliseconds.
    pub period_ms: u64,
    /// Requested priority.
    pub priority: i32,
    /// Requested core, if any.
    pub cpu_affinity: Option<usize>,
    /// Statistics snapshot (nanoseconds).
    pub stats: ServiceStatsSnapshot,
}

impl ServiceReport {
    pub(crate) fn from_service(service: &Service) -> Self {
        let config = service.config();
        Self {
            name: config.name.clone(),
            period_ms: config.period_ms,
            priority: config.priority,
            cpu_affinity: config.cpu_affinity,
            stats: service.snapshot(),
        }
    }
}

/// Snapshot of all services in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsReport {
    /// One entry per service.
    pub services: Vec<ServiceReport>,
    /// Tick source counters.
    pub timer: TickCounterSnapshot,
}

impl StatisticsReport {
    /// Entry for the named service.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|report| report.name == name)
    }

    /// Deadline misses summed over all services.
    #[must_use]
    pub fn total_deadline_misses(&self) -> u64 {
        self.services
            .iter()
            .map(|report| report.stats.deadline_misses())
            .sum()
    }
}

/// Nanoseconds rendered as milliseconds with microsecond resolution.
struct Millis(u64);

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:03} ms",
            self.0 / 1_000_000,
            (self.0 % 1_000_000) / 1_000
        )
    }
}

struct StatLine<'a>(&'a StatSnapshot);

impl fmt::Display for StatLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.0.min(), self.0.max(), self.0.mean()) {
            (Some(min), Some(max), Some(avg)) => write!(
                f,
                "min={}, max={}, avg={} ({} samples)",
                Millis(min),
                Millis(max),
                Millis(avg),
                self.0.count
            ),
            _ => f.write_str("no data"),
        }
    }
}

impl fmt::Display for ServiceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        write!(
            f,
            "{} (period {} ms, priority {}",
            self.name, self.period_ms, self.priority
        )?;
        match self.cpu_affinity {
            Some(core) => writeln!(f, ", cpu {core}):")?,
            None => writeln!(f, ", no affinity):")?,
        }
        writeln!(
            f,
            "  Releases:        {} (skipped periods {}, dropped {}, faults {})",
            stats.releases(),
            stats.skipped_periods,
            stats.dropped_releases,
            stats.faults
        )?;
        writeln!(f, "  Execution time:  {}", StatLine(&stats.execution))?;
        writeln!(f, "  Exec jitter:     {}", StatLine(&stats.execution_jitter))?;
        writeln!(f, "  Release jitter:  {}", StatLine(&stats.release_jitter))?;
        write!(
            f,
            "  Deadline misses: {} ({:.2}%), max lateness ",
            stats.deadline_misses(),
            stats.miss_rate_percent()
        )?;
        match stats.max_lateness() {
            Some(late) => write!(f, "{}", Millis(late)),
            None => f.write_str("no data"),
        }
    }
}

impl fmt::Display for StatisticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== Sequencer statistics =====")?;
        if self.services.is_empty() {
            writeln!(f, "no services registered")?;
        }
        for report in &self.services {
            writeln!(f, "{report}")?;
        }
        writeln!(
            f,
            "Timer: {} ticks, {} overruns ({:.2}%)",
            self.timer.ticks,
            self.timer.overruns,
            self.timer.overrun_rate_percent()
        )?;
        write!(f, "================================")
    }
}
