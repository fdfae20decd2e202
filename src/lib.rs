//! # gpdd
//!
//! **gpdd** runs a user-supplied network application as a pool of identical
//! worker processes and orchestrates their lifecycle, so a running service
//! can be reloaded, scaled, and monitored without dropping in-flight client
//! connections.
//!
//! ## Features
//!
//! | Area              | Description                                                      | Key types                                 |
//! |-------------------|------------------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | Worker pool lifecycle: fill, crash restart, graceful shutdown.   | [`Supervisor`], [`WorkerRegistry`]        |
//! | **Rolling reload**| Zero-downtime replacement, new generation ready before old drains.| [`Supervisor`], [`Command::Reload`]       |
//! | **Control plane** | Host signals and loopback IPC merged into one command stream.    | [`ControlHandle`], [`IpcServer`]          |
//! | **Readiness**     | Dual-channel detection: in-band token or URL probe.              | [`probe`](probe::probe), [`WorkerState`]  |
//! | **Observability** | Sequence-numbered lifecycle events with pluggable subscribers.   | [`Event`], [`Subscribe`], [`LogWriter`]   |
//! | **Errors**        | Typed runtime errors with stable labels.                         | [`RuntimeError`]                          |
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use gpdd::{Config, LogWriter, OsSpawner, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = PathBuf::from("./server");
//!     let spawner = Arc::new(OsSpawner::new(app.clone()));
//!
//!     let (mut sup, handle) = Supervisor::new(
//!         Config::from_env(),
//!         app,
//!         spawner,
//!         vec![Arc::new(LogWriter)],
//!     );
//!     # let _ = handle;
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

pub mod cli;
pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod events;
pub mod health;
pub mod ipc;
pub mod launcher;
pub mod probe;
pub mod runfiles;
pub mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use control::{Command, ControlHandle};
pub use core::{
    spawn_signal_adapter, OsSpawner, Spawn, Supervisor, WorkerEvent, WorkerId, WorkerInfo,
    WorkerProc, WorkerRegistry, WorkerState,
};
pub use error::RuntimeError;
pub use events::{Bus, Event, EventKind};
pub use health::HealthMonitor;
pub use ipc::{IpcClient, IpcServer, IpcState, RuntimeStatus};
pub use probe::ProbeOutcome;
pub use runfiles::RunFiles;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
