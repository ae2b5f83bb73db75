//! rtseq - periodic real-time service sequencer CLI
//!
//! Runs demo services on a shared tick and checks schedules against the
//! rate-monotonic utilization bound.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod load;
mod output;
mod schedule;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{CheckArgs, RunArgs};

#[derive(Parser)]
#[command(name = "rtseq")]
#[command(about = "Periodic real-time service sequencer - run and check service schedules")]
#[command(version)]
#[command(long_about = "
rtseq releases periodic services from a single shared tick. Each service runs
on its own worker thread with an optional real-time priority and CPU pin.

Schedules come from a YAML/JSON file, from --service flags, or both.
Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run services until Ctrl-C or the duration elapses, then print statistics
    Run(RunArgs),

    /// Validate a schedule file and compare its utilization with the Liu-Layland bound
    Check(CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rtseq={log_level},rtseq_scheduler={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(error::exit_code(&e))
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.json),
        Commands::Check(args) => commands::check::execute(args, cli.json),
    }
}
