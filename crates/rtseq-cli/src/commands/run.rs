//! Run demo services on the sequencer

use std::time::Duration;

use anyhow::{Context, Result};
use rtseq_scheduler::{Sequencer, max_realtime_priority};
use tracing::{info, warn};

use crate::commands::RunArgs;
use crate::error::CliError;
use crate::load;
use crate::output;
use crate::schedule::Schedule;

/// Execute the run command
pub fn execute(args: &RunArgs, json: bool) -> Result<()> {
    let schedule = build_schedule(args)?;
    let limit = args.duration_secs.map(duration_limit).transpose()?;
    let tick_ms = schedule.tick_ms(args.tick_ms);

    let mut sequencer = Sequencer::with_config(schedule.sequencer.clone())?;
    for spec in &schedule.services {
        sequencer
            .add_service_with_config(spec.service.clone(), load::callback(spec.load()))
            .with_context(|| format!("failed to add service '{}'", spec.service.name))?;
    }

    sequencer.start_services(tick_ms)?;
    info!(
        services = schedule.services.len(),
        tick_ms,
        limit = ?limit,
        "sequencer running"
    );

    let reason = sequencer.run_until_shutdown(limit);
    output::print_run_report(&sequencer.statistics(), reason, tick_ms, json)
}

/// Merge the schedule file with inline services and apply priority policy.
fn build_schedule(args: &RunArgs) -> Result<Schedule> {
    let mut schedule = match &args.config {
        Some(path) => Schedule::load(path)
            .with_context(|| format!("failed to load schedule {}", path.display()))?,
        None => Schedule::default(),
    };
    schedule.services.extend(args.services.iter().cloned());

    if args.rate_monotonic {
        match max_realtime_priority() {
            Some(highest) => {
                schedule.apply_rate_monotonic(highest);
                info!(highest, "assigned rate-monotonic priorities");
            }
            None => warn!("no real-time priority range on this platform; keeping priorities"),
        }
    }

    schedule.validate()?;
    if args.tick_ms == Some(0) {
        let err = CliError::InvalidConfiguration("--tick-ms must be greater than 0".into());
        return Err(err.into());
    }
    Ok(schedule)
}

fn duration_limit(secs: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(secs).map_err(|err| {
        CliError::InvalidConfiguration(format!("--duration-secs {secs}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn args(services: &[&str]) -> Result<RunArgs, CliError> {
        Ok(RunArgs {
            config: None,
            services: services
                .iter()
                .map(|spec| spec.parse())
                .collect::<Result<_, _>>()?,
            tick_ms: None,
            duration_secs: None,
            rate_monotonic: false,
        })
    }

    #[test]
    fn test_inline_services_build_schedule() -> TestResult {
        let schedule = build_schedule(&args(&["X:20:0", "Y:50:0"])?)?;
        assert_eq!(schedule.services.len(), 2);
        assert_eq!(schedule.tick_ms(None), 10);
        Ok(())
    }

    #[test]
    fn test_rate_monotonic_flag_orders_priorities() -> TestResult {
        let mut run = args(&["slow:100:0", "fast:10:0"])?;
        run.rate_monotonic = true;
        let schedule = build_schedule(&run)?;

        let priorities: Vec<i32> = schedule
            .services
            .iter()
            .map(|spec| spec.service.priority)
            .collect();
        if max_realtime_priority().is_some() {
            assert!(priorities.get(1) > priorities.first());
        } else {
            assert_eq!(priorities, vec![0, 0]);
        }
        Ok(())
    }

    #[test]
    fn test_empty_schedule_is_config_error() -> TestResult {
        let result = build_schedule(&args(&[])?);
        let err = result.err().ok_or("empty schedule accepted")?;
        assert_eq!(crate::error::exit_code(&err), crate::error::EXIT_CONFIG);
        Ok(())
    }

    #[test]
    fn test_zero_tick_rejected() -> TestResult {
        let mut run = args(&["X:20:0"])?;
        run.tick_ms = Some(0);
        assert!(build_schedule(&run).is_err_and(|err| {
            crate::error::exit_code(&err) == crate::error::EXIT_CONFIG
        }));
        Ok(())
    }

    #[test]
    fn test_duration_limit() -> TestResult {
        assert_eq!(duration_limit(0.25)?, Duration::from_millis(250));
        assert!(matches!(
            duration_limit(-1.0),
            Err(CliError::InvalidConfiguration(_))
        ));
        assert!(duration_limit(f64::NAN).is_err_and(|err| err.is_config_error()));
        Ok(())
    }

    #[test]
    fn test_short_inline_run_completes() -> TestResult {
        let mut run = args(&["X:5:0::1"])?;
        run.duration_secs = Some(0.05);
        execute(&run, true)?;
        Ok(())
    }
}
