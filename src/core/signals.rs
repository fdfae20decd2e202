//! # Host signal adapter.
//!
//! Translates process signals into lifecycle commands on the control
//! stream, so signal delivery and IPC requests share one ordered queue:
//!
//! - `SIGHUP` → [`Command::Reload`]
//! - `SIGTERM` → [`Command::Stop`]
//! - `SIGINT` (Ctrl-C) → [`Command::Stop`]
//!
//! Handlers never mutate supervisor state directly; they only enqueue.
//! On non-Unix platforms only Ctrl-C is mapped (to `Stop`).

use tokio_util::sync::CancellationToken;

use crate::control::{Command, ControlHandle};

/// Spawns the background task that forwards signals as commands until the
/// token is cancelled.
///
/// Signal registration failures are logged and leave the process reachable
/// through the IPC surface only.
#[cfg(unix)]
pub fn spawn_signal_adapter(handle: ControlHandle, token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to register SIGHUP handler");
                return;
            }
        };
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to register SIGTERM handler");
                return;
            }
        };
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to register SIGINT handler");
                return;
            }
        };

        loop {
            let cmd = tokio::select! {
                _ = token.cancelled() => break,
                _ = hangup.recv() => Command::Reload,
                _ = terminate.recv() => Command::Stop,
                _ = interrupt.recv() => Command::Stop,
            };
            if handle.send(cmd).await.is_err() {
                break;
            }
        }
    });
}

/// Spawns the background task that forwards Ctrl-C as `Stop` until the
/// token is cancelled.
#[cfg(not(unix))]
pub fn spawn_signal_adapter(handle: ControlHandle, token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    let _ = handle.send(Command::Stop).await;
                }
            }
        }
    });
}
