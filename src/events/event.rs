//! # Runtime events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker lifecycle**: fork, ready, draining, exit, spawn failures,
//!   missed deadlines
//! - **Lifecycle transitions**: rolling reload steps, scaling, rejected
//!   commands
//! - **Shutdown**: request, completion within grace, grace exceeded
//! - **Probing**: liveness check failures
//!
//! The [`Event`] struct carries metadata such as the worker id, child pid,
//! error messages, and the deadline that was hit.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. This guarantees that events can be ordered correctly even
//! when delivered out-of-order through async channels.
//!
//! ## Event flow examples
//!
//! ### One rolling-reload step
//! ```text
//! ReloadStarted
//!   → WorkerForked (replacement)
//!   → WorkerReady (token or probe)
//!   → WorkerDraining (old)
//!   → WorkerExited (old)
//!   → ... next step ...
//! ReloadFinished
//! ```
//!
//! ### Crash restart
//! ```text
//! WorkerExited (unexpected)
//!   → WorkerForked (replacement)
//!   → WorkerReady
//! ```
//!
//! ## Example
//! ```rust
//! use gpdd::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::WorkerExited)
//!     .with_worker(3)
//!     .with_pid(4242)
//!     .with_error("exit code 1");
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.worker, Some(3));
//! assert_eq!(ev.error.as_deref(), Some("exit code 1"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::WorkerId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// A worker process was forked and entered the registry as `starting`.
    WorkerForked,
    /// A worker reached `ready` (in-band token or readiness probe).
    WorkerReady,
    /// A worker was asked to drain (reload step, scale-down, or shutdown).
    WorkerDraining,
    /// A worker left the registry (observed exit or force-kill).
    WorkerExited,
    /// A worker process could not be created.
    SpawnFailed,
    /// A worker did not reach `ready` before the readiness deadline.
    ReadyTimeout,
    /// A draining worker did not exit before the grace deadline and was
    /// force-killed.
    DrainTimeout,

    // === Lifecycle transitions ===
    /// A rolling reload began.
    ReloadStarted,
    /// One reload step was abandoned; the old worker stays in place.
    ReloadStepAborted,
    /// The rolling reload completed (or was cut short by shutdown).
    ReloadFinished,
    /// The pool grew by one worker.
    ScaledUp,
    /// The oldest worker was retired and the pool shrank by one.
    ScaledDown,
    /// A lifecycle command arrived while another transition was in
    /// progress (or violated a precondition) and was rejected.
    CommandRejected,

    // === Shutdown ===
    /// Graceful termination was requested (signal or IPC).
    ShutdownRequested,
    /// All workers exited within the configured grace period.
    AllStoppedWithin,
    /// Grace period exceeded; remaining workers were force-killed.
    GraceExceeded,

    // === Probing ===
    /// A periodic liveness probe failed at the transport level.
    HealthCheckFailed,
}

/// Runtime event with optional metadata.
///
/// ## Fields
/// - `seq`: unique sequence number for ordering (monotonically increasing)
/// - `at`: wall-clock timestamp (may go backwards due to NTP, logging only)
/// - `kind`: event classification
/// - `worker`, `pid`, `command`, `error`, `timeout`: optional metadata
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Worker id, if the event concerns a single worker.
    pub worker: Option<WorkerId>,
    /// Operating-system pid of the worker's child process, if known.
    pub pid: Option<u32>,
    /// Command name, for rejections.
    pub command: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// The deadline that was involved (ready or grace), if relevant.
    pub timeout: Option<Duration>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            command: None,
            error: None,
            timeout: None,
        }
    }

    /// Attaches a worker id.
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a child pid.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a command name.
    pub fn with_command(mut self, name: impl Into<String>) -> Self {
        self.command = Some(name.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches the deadline involved.
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::WorkerForked);
        let b = Event::now(EventKind::WorkerReady);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = Event::now(EventKind::CommandRejected)
            .with_command("scale-down")
            .with_error("minimum pool size");
        assert_eq!(ev.command.as_deref(), Some("scale-down"));
        assert_eq!(ev.error.as_deref(), Some("minimum pool size"));
        assert!(ev.worker.is_none());
    }
}
