//! Command implementations for the rtseq CLI

pub mod check;
pub mod run;

use std::path::PathBuf;

use clap::Args;

use crate::schedule::ServiceSpec;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Schedule file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Extra service as NAME:PERIOD_MS:PRIORITY[:CPU[:LOAD_MS]] (repeatable)
    #[arg(short, long = "service", value_name = "SPEC")]
    pub services: Vec<ServiceSpec>,

    /// Shared tick in milliseconds (default: file value or period GCD)
    #[arg(short, long)]
    pub tick_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    pub duration_secs: Option<f64>,

    /// Assign priorities by period, shortest period highest
    #[arg(long)]
    pub rate_monotonic: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schedule file to validate
    #[arg(short, long)]
    pub config: PathBuf,
}
