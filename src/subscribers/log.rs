//! # Built-in logging subscriber.
//!
//! [`LogWriter`] renders lifecycle events as structured `tracing` records.
//! It is the default observer wired in by the `start` command; replace or
//! extend it with custom [`Subscribe`](crate::Subscribe) implementations for
//! metrics or alerting.
//!
//! ## Output shape
//! ```text
//! INFO worker forked worker=3 pid=4242
//! INFO worker ready worker=3
//! WARN reload step aborted worker=5 error="replacement not ready"
//! INFO all workers stopped within grace
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Structured-log subscriber backed by `tracing`.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::WorkerForked => {
                tracing::info!(worker = e.worker, pid = e.pid, "worker forked");
            }
            EventKind::WorkerReady => {
                tracing::info!(worker = e.worker, "worker ready");
            }
            EventKind::WorkerDraining => {
                tracing::info!(worker = e.worker, "worker draining");
            }
            EventKind::WorkerExited => {
                tracing::info!(
                    worker = e.worker,
                    pid = e.pid,
                    detail = e.error.as_deref(),
                    "worker exited"
                );
            }
            EventKind::SpawnFailed => {
                tracing::error!(error = e.error.as_deref(), "worker spawn failed");
            }
            EventKind::ReadyTimeout => {
                tracing::warn!(
                    worker = e.worker,
                    deadline = ?e.timeout,
                    "worker not ready within deadline"
                );
            }
            EventKind::DrainTimeout => {
                tracing::warn!(
                    worker = e.worker,
                    deadline = ?e.timeout,
                    "drain deadline exceeded, force-killing"
                );
            }
            EventKind::ReloadStarted => {
                tracing::info!("rolling reload started");
            }
            EventKind::ReloadStepAborted => {
                tracing::warn!(
                    worker = e.worker,
                    error = e.error.as_deref(),
                    "reload step aborted, keeping old worker"
                );
            }
            EventKind::ReloadFinished => {
                tracing::info!("rolling reload finished");
            }
            EventKind::ScaledUp => {
                tracing::info!(worker = e.worker, "scaled up");
            }
            EventKind::ScaledDown => {
                tracing::info!(worker = e.worker, "scaled down");
            }
            EventKind::CommandRejected => {
                tracing::warn!(
                    command = e.command.as_deref(),
                    reason = e.error.as_deref(),
                    "command rejected"
                );
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("all workers stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(grace = ?e.timeout, "grace exceeded, forcing exit");
            }
            EventKind::HealthCheckFailed => {
                tracing::warn!(error = e.error.as_deref(), "health check failed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
