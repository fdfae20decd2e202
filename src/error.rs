//! # Error types used by the gpdd runtime.
//!
//! [`RuntimeError`] covers failures of the supervision runtime itself:
//! startup preconditions (pid lock, IPC bind), worker spawning, and the
//! shutdown grace deadline. Each variant provides `as_label()` for
//! logs and metrics.
//!
//! Worker-level failures (a child exiting with a non-zero code, a missed
//! readiness deadline) are not errors at this layer; they flow through the
//! event bus and the supervisor's dispositions instead.

use std::time::Duration;

use thiserror::Error;

use crate::core::WorkerId;

/// Errors produced by the gpdd runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Another master holds the pid lock and its process is still alive.
    #[error("another instance is already running (pid {pid})")]
    AlreadyRunning {
        /// Pid recorded in the lock file.
        pid: i32,
    },

    /// A worker process could not be created.
    #[error("failed to spawn worker: {source}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },

    /// The loopback IPC endpoint could not be bound. Fatal at startup.
    #[error("failed to bind loopback IPC endpoint: {source}")]
    IpcBind {
        #[source]
        source: std::io::Error,
    },

    /// The pid lock or port sidecar file could not be read or written.
    #[error("runtime file error: {source}")]
    RunFile {
        #[source]
        source: std::io::Error,
    },

    /// Shutdown grace period expired with workers still alive; they were
    /// force-terminated and the process exits with a non-zero status.
    #[error("shutdown grace {grace:?} exceeded; stuck workers: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of workers that did not exit in time.
        stuck: Vec<WorkerId>,
    },

    /// The control command channel closed while the supervisor was running.
    #[error("control command channel closed")]
    ControlClosed,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyRunning { .. } => "already_running",
            RuntimeError::SpawnFailed { .. } => "spawn_failed",
            RuntimeError::IpcBind { .. } => "ipc_bind",
            RuntimeError::RunFile { .. } => "run_file",
            RuntimeError::GraceExceeded { .. } => "grace_exceeded",
            RuntimeError::ControlClosed => "control_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let e = RuntimeError::AlreadyRunning { pid: 42 };
        assert_eq!(e.as_label(), "already_running");

        let e = RuntimeError::GraceExceeded {
            grace: Duration::from_secs(30),
            stuck: vec![1, 2],
        };
        assert_eq!(e.as_label(), "grace_exceeded");
        assert!(e.to_string().contains("stuck workers"));
    }
}
