//! Output formatting for CLI responses

use anyhow::{Error, Result};
use colored::Colorize;
use rtseq_scheduler::{StatisticsReport, StopReason};
use serde_json::json;

use crate::schedule::{Utilization, Verdict};

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "causes": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

fn reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::ShutdownRequested => "shutdown_requested",
        StopReason::TimeLimit => "time_limit",
    }
}

/// Print the statistics gathered by a finished run.
pub fn print_run_report(
    report: &StatisticsReport,
    reason: StopReason,
    tick_ms: u64,
    json: bool,
) -> Result<()> {
    if json {
        let output = json!({
            "success": true,
            "stop_reason": reason_label(reason),
            "tick_ms": tick_ms,
            "statistics": report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "{} {} (tick {} ms)",
            "Stopped:".bold(),
            reason_label(reason).replace('_', " "),
            tick_ms
        );
        println!("{report}");
        let misses = report.total_deadline_misses();
        if misses > 0 {
            println!("{}", format!("{misses} deadline misses").yellow());
        }
    }
    Ok(())
}

/// Print a schedulability check.
pub fn print_check(tick_ms: u64, utilization: &Utilization, json: bool) -> Result<()> {
    if json {
        let output = json!({
            "success": true,
            "tick_ms": tick_ms,
            "utilization": utilization,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} {} services, tick {} ms",
        "Schedule:".bold(),
        utilization.services.len(),
        tick_ms
    );
    for service in &utilization.services {
        println!(
            "  {:<16} period {:>6} ms  load {:>6} ms  U={:.3}",
            service.name, service.period_ms, service.load_ms, service.utilization
        );
    }
    println!("Total utilization: {:.3}", utilization.total);
    println!(
        "Liu-Layland bound (n={}): {:.3}",
        utilization.services.len(),
        utilization.bound
    );
    let verdict = utilization.verdict.describe();
    let verdict = match utilization.verdict {
        Verdict::Schedulable => verdict.green(),
        Verdict::Inconclusive => verdict.yellow(),
        Verdict::Overloaded => verdict.red(),
    };
    println!("Verdict: {verdict}");
    Ok(())
}
