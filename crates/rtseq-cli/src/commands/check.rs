//! Schedule validation and utilization check

use anyhow::{Context, Result};

use crate::commands::CheckArgs;
use crate::output;
use crate::schedule::Schedule;

/// Execute the check command
pub fn execute(args: &CheckArgs, json: bool) -> Result<()> {
    let schedule = Schedule::load(&args.config)
        .with_context(|| format!("failed to load schedule {}", args.config.display()))?;
    schedule.validate()?;

    let tick_ms = schedule.tick_ms(None);
    let utilization = schedule.utilization();
    tracing::debug!(
        services = utilization.services.len(),
        total = utilization.total,
        bound = utilization.bound,
        "schedule checked"
    );
    output::print_check(tick_ms, &utilization, json)
}
