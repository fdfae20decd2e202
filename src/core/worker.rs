//! # Worker process plumbing.
//!
//! Bridges the supervisor's state machine to real operating-system
//! processes:
//!
//! - [`Spawn`] — the seam through which the supervisor creates workers.
//!   Production uses [`OsSpawner`]; tests inject an in-process fake.
//! - [`WorkerProc`] — the live handle the supervisor keeps per worker:
//!   pid, drain request, force-kill.
//! - [`WorkerEvent`] — what a worker reports back (readiness token, exit).
//!
//! ## Message channel
//! The master and a worker speak over the child's stdio with bare tokens:
//! the child announces `ready` on stdout when its accept loop is up; the
//! master writes `shutdown` to the child's stdin to request a graceful
//! drain. Any other stdout line is forwarded to the diagnostic log.
//!
//! ## Listening socket
//! Workers bind their listening address themselves with address reuse, so
//! overlapping generations accept from the same kernel queue during reload
//! windows. The supervisor never owns the socket.
//!
//! ```text
//! OsSpawner::spawn(id)
//!   ├─► tokio::process::Command (stdin piped, stdout piped, stderr inherited)
//!   ├─► reader task: stdout lines ──"ready"──► WorkerEvent::Ready(id)
//!   │                             └─other───► tracing::debug
//!   └─► waiter task: child.wait() ──────────► WorkerEvent::Exited{id, code}
//! ```

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;

use crate::error::RuntimeError;

use super::registry::WorkerId;

/// Token a worker emits when its accept loop is up.
pub const READY_TOKEN: &str = "ready";
/// Token the master sends to request a graceful drain.
pub const SHUTDOWN_TOKEN: &str = "shutdown";

/// Environment variable carrying the worker's id into the child.
const ENV_WORKER_ID: &str = "GPDD_WORKER_ID";

/// Events a worker process reports back to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The worker emitted the `ready` token on its message channel.
    Ready(WorkerId),
    /// The operating system reported the worker's exit.
    Exited {
        id: WorkerId,
        code: Option<i32>,
    },
}

/// Live handle to a spawned worker process.
#[async_trait]
pub trait WorkerProc: Send {
    /// Operating-system pid of the child.
    fn pid(&self) -> u32;

    /// Sends the `shutdown` token over the message channel.
    ///
    /// Best-effort: a worker that already closed its stdin is about to
    /// exit anyway.
    async fn request_drain(&mut self);

    /// Terminates the child immediately (SIGKILL).
    fn force_kill(&self);
}

/// Factory for worker processes.
///
/// The seam exists so the state machine can be exercised without forking
/// real processes; the supervisor only ever talks to this trait.
#[async_trait]
pub trait Spawn: Send + Sync + 'static {
    /// Creates one worker. Readiness and exit are delivered on `events`.
    async fn spawn(
        &self,
        id: WorkerId,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Result<Box<dyn WorkerProc>, RuntimeError>;
}

/// Spawns real worker processes with `tokio::process`.
pub struct OsSpawner {
    app: PathBuf,
}

impl OsSpawner {
    /// Creates a spawner for the given worker binary.
    pub fn new(app: PathBuf) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Spawn for OsSpawner {
    async fn spawn(
        &self,
        id: WorkerId,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Result<Box<dyn WorkerProc>, RuntimeError> {
        let mut child = Command::new(&self.app)
            .env(ENV_WORKER_ID, id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RuntimeError::SpawnFailed { source })?;

        let pid = child.id().unwrap_or(0);
        let stdin = child.stdin.take();

        if let Some(stdout) = child.stdout.take() {
            let token_tx = events.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.trim() == READY_TOKEN {
                        let _ = token_tx.send(WorkerEvent::Ready(id)).await;
                    } else {
                        tracing::debug!(worker = id, "{line}");
                    }
                }
            });
        }

        tokio::spawn(async move {
            let code = child.wait().await.ok().and_then(|status| status.code());
            let _ = events.send(WorkerEvent::Exited { id, code }).await;
        });

        Ok(Box::new(OsWorker { pid, stdin }))
    }
}

/// Handle to a real child process.
struct OsWorker {
    pid: u32,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl WorkerProc for OsWorker {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn request_drain(&mut self) {
        if let Some(stdin) = self.stdin.as_mut() {
            let token = format!("{SHUTDOWN_TOKEN}\n");
            let _ = stdin.write_all(token.as_bytes()).await;
            let _ = stdin.flush().await;
        }
    }

    fn force_kill(&self) {
        if self.pid != 0 {
            let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGKILL);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use super::*;

    fn write_worker_script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("worker.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn ready_token_and_drain_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_worker_script(dir.path(), "echo ready\nread _token\nexit 0\n");

        let (tx, mut rx) = mpsc::channel(8);
        let spawner = OsSpawner::new(app);
        let mut proc = spawner.spawn(1, tx).await.unwrap();
        assert!(proc.pid() > 0);

        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev, WorkerEvent::Ready(1));

        proc.request_drain().await;
        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev, WorkerEvent::Exited { id: 1, code: Some(0) });
    }

    #[tokio::test]
    async fn force_kill_reports_exit_without_code() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_worker_script(dir.path(), "sleep 60\n");

        let (tx, mut rx) = mpsc::channel(8);
        let spawner = OsSpawner::new(app);
        let proc = spawner.spawn(2, tx).await.unwrap();

        proc.force_kill();
        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev, WorkerEvent::Exited { id: 2, code: None });
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let (tx, _rx) = mpsc::channel(1);
        let spawner = OsSpawner::new(PathBuf::from("/nonexistent/worker-binary"));
        let err = spawner.spawn(3, tx).await.err().unwrap();
        assert_eq!(err.as_label(), "spawn_failed");
    }
}
