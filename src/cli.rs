//! Command-line interface of the `gpdd` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gpdd",
    about = "Run a network application as a supervised pool of worker processes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the supervisor in the foreground (or detached with --daemon)
    Start(StartArgs),
    /// Ask the running supervisor to perform a rolling reload
    Reload,
    /// Gracefully stop the running supervisor
    Stop,
    /// Show the status of the running supervisor
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Path to the worker application binary
    pub app: PathBuf,

    /// Number of worker processes (default: GPDD_WORKERS or the CPU count)
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// URL probed to detect worker readiness; any HTTP response counts
    #[arg(long, value_name = "URL")]
    pub ready_url: Option<String>,

    /// URL probed periodically for liveness
    #[arg(long, value_name = "URL")]
    pub health_url: Option<String>,

    /// Liveness probe interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub health_interval: Option<u64>,

    /// Consecutive liveness failures before the pool is recycled
    #[arg(long, value_name = "N")]
    pub health_threshold: Option<u32>,

    /// Detach and run in the background, logging to gpdd.log
    #[arg(long)]
    pub daemon: bool,
}
