//! # Control plane: one ordered command stream.
//!
//! Host signals, the loopback IPC surface, and the health monitor all inject
//! lifecycle commands here. The supervisor consumes them serially from a
//! single mpsc queue, so delivery order is arrival order and the supervisor's
//! own idempotence guards resolve duplicates.
//!
//! ```text
//! SIGHUP ─────────► reload ─┐
//! SIGTERM/SIGINT ─► stop ───┤
//! POST /reload ───► reload ─┼──► mpsc ──► Supervisor command loop
//! POST /stop ─────► stop ───┤
//! POST /scale/* ──► scale ──┤
//! health monitor ─► reload ─┘
//! ```

mod command;

pub use command::{channel, Command, ControlHandle};
