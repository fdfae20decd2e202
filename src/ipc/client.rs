//! Operator-side client for the loopback contract.
//!
//! Resolves the endpoint through the port sidecar in the working directory.
//! When the sidecar is missing (or the request fails), `reload` and `stop`
//! fall back to host signals against the pid recorded in the lock file;
//! `status` reports "no running instance" instead.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::runfiles;

use super::wire::{Ack, RuntimeStatus};

/// How long `stop` waits for the master to exit before sending kill.
const STOP_WAIT: Duration = Duration::from_secs(30);
/// Poll cadence while waiting for the master to exit.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Client for a master running in `dir`.
pub struct IpcClient {
    dir: PathBuf,
    http: reqwest::Client,
}

impl IpcClient {
    /// Creates a client rooted at the given working directory.
    pub fn new(dir: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { dir, http })
    }

    /// Fetches the runtime status, or `None` when no instance is reachable.
    pub async fn status(&self) -> Result<Option<RuntimeStatus>> {
        let Some(base) = self.base() else {
            return Ok(None);
        };
        let resp = self
            .http
            .get(format!("{base}/status"))
            .send()
            .await
            .context("status request failed")?;
        let status = resp
            .error_for_status()
            .context("status request rejected")?
            .json()
            .await
            .context("malformed status body")?;
        Ok(Some(status))
    }

    /// Requests a rolling reload, falling back to a hangup signal when the
    /// IPC surface is unavailable.
    pub async fn reload(&self) -> Result<()> {
        if let Some(base) = self.base() {
            match self.post(&base, "/reload").await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::debug!(error = %err, "ipc reload failed, falling back to signal");
                }
            }
        }
        self.signal_master(Signal::SIGHUP)
    }

    /// Requests graceful termination and waits up to 30 seconds for the
    /// master to exit; a straggler finally gets kill. Errors on timeout.
    pub async fn stop(&self) -> Result<()> {
        let pid = runfiles::read_pid_in(&self.dir)?;

        let mut requested = false;
        if let Some(base) = self.base() {
            match self.post(&base, "/stop").await {
                Ok(()) => requested = true,
                Err(err) => {
                    tracing::debug!(error = %err, "ipc stop failed, falling back to signal");
                }
            }
        }

        let Some(pid) = pid else {
            // Without a pid there is no exit to observe; the acknowledged
            // request is the best signal available.
            if requested {
                return Ok(());
            }
            bail!("no running instance");
        };

        if !requested {
            if !runfiles::process_alive(pid) {
                bail!("no running instance");
            }
            kill(Pid::from_raw(pid), Signal::SIGTERM).context("failed to signal master")?;
        }

        let deadline = tokio::time::Instant::now() + STOP_WAIT;
        while tokio::time::Instant::now() < deadline {
            if !runfiles::process_alive(pid) {
                return Ok(());
            }
            tokio::time::sleep(STOP_POLL).await;
        }

        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
        bail!("master did not exit within {STOP_WAIT:?}; sent kill");
    }

    fn base(&self) -> Option<String> {
        runfiles::read_port_in(&self.dir).map(|port| format!("http://127.0.0.1:{port}"))
    }

    async fn post(&self, base: &str, route: &str) -> Result<()> {
        let ack: Ack = self
            .http
            .post(format!("{base}{route}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !ack.ok {
            bail!("command not acknowledged");
        }
        Ok(())
    }

    /// Sends a signal to the recorded master pid.
    fn signal_master(&self, sig: Signal) -> Result<()> {
        let pid = runfiles::read_pid_in(&self.dir)?.context("no running instance")?;
        if !runfiles::process_alive(pid) {
            bail!("no running instance");
        }
        kill(Pid::from_raw(pid), sig).context("failed to signal master")?;
        Ok(())
    }
}
