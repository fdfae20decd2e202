//! # Periodic liveness monitor.
//!
//! [`HealthMonitor`] wraps the single-shot [`probe`](crate::probe::probe)
//! with a fixed cadence and a consecutive-failure counter. When the counter
//! reaches the configured threshold, one `reload` command is enqueued on
//! the control stream (recycling the pool) and the counter resets.
//!
//! The monitor never touches the registry; like every other control-plane
//! producer it only publishes events and enqueues commands.
//!
//! ```text
//! every `interval`:
//!   probe(health_url)
//!     ├─ HTTP-level response → failures = 0
//!     └─ transport failure   → failures += 1, publish HealthCheckFailed
//!                              failures == threshold → enqueue reload, reset
//! ```

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::control::{Command, ControlHandle};
use crate::events::{Bus, Event, EventKind};
use crate::probe;

/// Upper bound on a single liveness probe, independent of cadence.
const PROBE_CAP: Duration = Duration::from_secs(5);

/// Periodic liveness prober for the worker pool.
pub struct HealthMonitor {
    url: String,
    interval: Duration,
    threshold: u32,
    handle: ControlHandle,
    bus: Bus,
}

impl HealthMonitor {
    /// Creates a monitor for `url`, probing every `interval` and recycling
    /// the pool after `threshold` consecutive failures.
    pub fn new(
        url: String,
        interval: Duration,
        threshold: u32,
        handle: ControlHandle,
        bus: Bus,
    ) -> Self {
        Self {
            url,
            interval,
            threshold: threshold.max(1),
            handle,
            bus,
        }
    }

    /// Spawns the monitor task; it runs until the token is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = time::interval(self.interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a freshly started
            // pool gets one full interval to come up.
            tick.tick().await;

            let mut failures: u32 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {}
                }

                let outcome = probe::probe(&self.url, self.interval.min(PROBE_CAP)).await;
                if outcome.reachable() {
                    failures = 0;
                    continue;
                }

                failures += 1;
                self.bus.publish(
                    Event::now(EventKind::HealthCheckFailed)
                        .with_error(outcome.error.unwrap_or_else(|| "no response".into())),
                );

                if failures >= self.threshold {
                    if self.handle.send(Command::Reload).await.is_err() {
                        break;
                    }
                    failures = 0;
                }
            }
        })
    }
}
