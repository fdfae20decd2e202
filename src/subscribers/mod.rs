//! # Event subscribers for the gpdd runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out, and the built-in [`LogWriter`] that renders lifecycle events as
//! structured log lines.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Supervisor ── publish(Event) ──► Bus ──► subscriber_listener()
//!                                                  │
//!                                                  ▼
//!                                            SubscriberSet
//!                                      ┌──────────┼──────────┐
//!                                      ▼          ▼          ▼
//!                                  LogWriter   Metrics    Custom ...
//! ```
//!
//! Subscribers are isolated from the runtime: each one gets a bounded queue
//! and a dedicated worker task, and a panicking subscriber cannot take the
//! supervisor down with it.

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
