//! Runtime core: orchestration and worker lifecycle.
//!
//! This module contains the supervision runtime. The public API re-exported
//! from here is [`Supervisor`] plus the registry data model and the worker
//! spawning seam; everything else is an internal building block the
//! supervisor wires together.
//!
//! ## Files & responsibilities
//! - **supervisor.rs**: the state machine; owns the runtime (Bus, Registry,
//!   SubscriberSet, process handles), consumes the command stream, drives
//!   rolling reload / scaling / crash restart / graceful shutdown.
//! - **registry.rs**: the worker table: `starting → ready → draining` state
//!   machine keyed by monotonic ids, consistent snapshots for readers.
//! - **worker.rs**: process plumbing: `Spawn` seam, `OsSpawner` over
//!   `tokio::process`, the stdio token channel (`ready` / `shutdown`),
//!   exit watcher, force-kill.
//! - **signals.rs**: host signal adapter feeding the command stream.
//!
//! ## Wiring (module-level flow)
//! ```text
//! CLI `start`
//!   └─ builds Config, acquires run files, binds IPC, creates Supervisor
//!
//! Supervisor::run()
//!   ├─ spawn subscriber_listener()      (bus → SubscriberSet)
//!   ├─ initial fill: spawn_worker() × N
//!   └─ command loop (single writer)
//!
//!                  ┌───────────── command stream (mpsc) ─────────────┐
//! Producers:       │                                                 │
//!   signal adapter ──► reload / stop                                 │
//!   IPC surface ─────► reload / stop / scale-up / scale-down         │
//!   health monitor ──► reload                                        │
//!                  └──────────────────────┬──────────────────────────┘
//!                                         ▼
//!                              Supervisor command loop
//!                    ├─ on Reload    → rolling reload protocol
//!                    ├─ on ScaleUp   → spawn one worker
//!                    ├─ on ScaleDown → retire the oldest worker
//!                    ├─ on Stop      → graceful shutdown (terminal)
//!                    ├─ on worker event → mark ready / handle exit
//!                    └─ on idle tick → readiness probe, deadline warnings
//!
//! Worker events (per child, via one mpsc):
//!   stdout "ready" ──► WorkerEvent::Ready(id)
//!   process exit ────► WorkerEvent::Exited{id, code}
//! ```
//!
//! ## Rolling reload (per worker id present at entry)
//! ```text
//! fork replacement → wait ready (token OR probe, ≤ ready_timeout)
//!   ├─ ready    → old: mark draining, send shutdown token,
//!   │            wait exit ≤ grace, force-kill on expiry, remove
//!   ├─ not ready→ kill replacement, keep old, next id
//!   └─ stop seen→ leave replacement to the shutdown drain, exit loop
//! ```
//!
//! ## Notes
//! - Event ordering is maintained via a global monotonic sequence number.
//! - The registry and the transition flags have exactly one writer: the
//!   command loop. Readers take snapshots under the same lock.
//! - A worker id is never reused within a master lifetime.

mod registry;
mod signals;
mod supervisor;
mod worker;

pub use registry::{WorkerId, WorkerInfo, WorkerRegistry, WorkerState};
pub use signals::spawn_signal_adapter;
pub use supervisor::Supervisor;
pub use worker::{OsSpawner, Spawn, WorkerEvent, WorkerProc, READY_TOKEN, SHUTDOWN_TOKEN};
