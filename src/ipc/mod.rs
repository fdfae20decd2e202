//! # Loopback IPC: the request/response control surface.
//!
//! A small HTTP endpoint bound to 127.0.0.1 only, never reachable off-host.
//! The server side ([`IpcServer`]) answers status queries from registry
//! snapshots and forwards lifecycle commands onto the control stream — it
//! never mutates the registry itself. The bound port is published to the
//! sidecar file next to the pid lock so the operator CLI ([`IpcClient`])
//! can find it; a missing sidecar makes callers fall back to host signals.
//!
//! ## Endpoints
//! | Route | Effect |
//! |---|---|
//! | `GET /status` | current [`RuntimeStatus`] |
//! | `POST /reload` | enqueue `reload` |
//! | `POST /stop` | acknowledge, then enqueue `stop` |
//! | `POST /scale/up`, `POST /scale/down` | enqueue the scale command |
//! | anything else | `404 {"error":"not found"}` |

mod client;
mod server;
mod wire;

pub use client::IpcClient;
pub use server::{IpcServer, IpcState};
pub use wire::{Ack, ErrorBody, RuntimeStatus, WorkerStatus};
