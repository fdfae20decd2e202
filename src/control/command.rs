//! Lifecycle commands and the handle used to submit them.

use tokio::sync::mpsc;

use crate::error::RuntimeError;

/// A lifecycle command consumed by the supervisor.
///
/// Duplicates are permitted on the stream; the supervisor rejects commands
/// that conflict with an in-progress transition, except `Stop`, which
/// supersedes everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replace every worker with a fresh one, one at a time (rolling reload).
    Reload,
    /// Begin graceful termination.
    Stop,
    /// Append one worker to the pool.
    ScaleUp,
    /// Retire the oldest worker.
    ScaleDown,
}

impl Command {
    /// Returns the wire/log name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Reload => "reload",
            Command::Stop => "stop",
            Command::ScaleUp => "scale-up",
            Command::ScaleDown => "scale-down",
        }
    }
}

/// Clonable handle for submitting commands to the supervisor.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Command>,
}

impl ControlHandle {
    /// Submits a command (waits if the queue is full).
    pub async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ControlClosed)
    }
}

/// Creates the command stream: a handle for producers and the receiver the
/// supervisor owns.
pub fn channel(capacity: usize) -> (ControlHandle, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ControlHandle { tx }, rx)
}
