//! # Detached launcher for `--daemon`.
//!
//! Daemonization is a thin re-exec: the launcher starts a second copy of
//! this binary with the same `start` arguments minus `--daemon`, standard
//! I/O redirected to a log file, and returns the child's pid. The
//! supervisor itself has no notion of detachment.

use std::fs::File;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::cli::StartArgs;

/// Log file the detached supervisor writes to, in the working directory.
pub const DAEMON_LOG: &str = "gpdd.log";

/// Re-executes `gpdd start` detached. Returns the supervisor's pid.
pub fn daemonize(args: &StartArgs) -> Result<u32> {
    let exe = std::env::current_exe().context("cannot resolve own executable")?;
    let log = File::options()
        .create(true)
        .append(true)
        .open(DAEMON_LOG)
        .with_context(|| format!("cannot open {DAEMON_LOG}"))?;

    let mut cmd = Command::new(exe);
    cmd.arg("start").arg(&args.app);
    if let Some(workers) = args.workers {
        cmd.arg("--workers").arg(workers.to_string());
    }
    if let Some(url) = &args.ready_url {
        cmd.arg("--ready-url").arg(url);
    }
    if let Some(url) = &args.health_url {
        cmd.arg("--health-url").arg(url);
    }
    if let Some(ms) = args.health_interval {
        cmd.arg("--health-interval").arg(ms.to_string());
    }
    if let Some(n) = args.health_threshold {
        cmd.arg("--health-threshold").arg(n.to_string());
    }

    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone().context("cannot clone log handle")?))
        .stderr(Stdio::from(log))
        .spawn()
        .context("failed to launch detached supervisor")?;

    Ok(child.id())
}
