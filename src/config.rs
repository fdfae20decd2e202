//! # Global runtime configuration.
//!
//! [`Config`] defines the supervisor's behavior: pool size, readiness and
//! drain deadlines, probe cadence, optional readiness/liveness URLs, and
//! the loopback IPC port.
//!
//! Precedence is CLI over environment over defaults: [`Config::from_env`]
//! reads the `GPDD_*` variables, and the CLI layer overrides individual
//! fields afterwards.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use gpdd::Config;
//!
//! let mut cfg = Config::default();
//! cfg.workers = 4;
//! cfg.grace = Duration::from_secs(10);
//!
//! assert_eq!(cfg.workers, 4);
//! ```

use std::time::Duration;

/// Environment variable names recognized by the supervisor.
const ENV_WORKERS: &str = "GPDD_WORKERS";
const ENV_GRACE_TIMEOUT: &str = "GPDD_GRACE_TIMEOUT";
const ENV_READY_TIMEOUT: &str = "GPDD_READY_TIMEOUT";
const ENV_READY_URL: &str = "GPDD_READY_URL";
const ENV_HEALTH_URL: &str = "GPDD_HEALTH_URL";
const ENV_IPC_PORT: &str = "GPDD_IPC_PORT";

/// Global configuration for the supervisor runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of worker processes in the pool.
    pub workers: usize,
    /// Maximum time a draining worker gets to exit before being force-killed.
    pub grace: Duration,
    /// Maximum time a newly forked worker gets to reach ready.
    pub ready_timeout: Duration,
    /// Interval between readiness probes while a worker is starting.
    pub ready_poll: Duration,
    /// URL probed to detect worker readiness (any HTTP-level response counts).
    pub ready_url: Option<String>,
    /// URL probed periodically for liveness.
    pub health_url: Option<String>,
    /// Interval between liveness probes.
    pub health_interval: Duration,
    /// Consecutive liveness failures before the pool is recycled.
    pub health_threshold: u32,
    /// Fixed loopback IPC port (0 = ephemeral).
    pub ipc_port: u16,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `workers = host CPU count`
    /// - `grace = 30s`
    /// - `ready_timeout = 10s`
    /// - `ready_poll = 500ms`
    /// - `health_interval = 10s`, `health_threshold = 3`
    /// - `ipc_port = 0` (ephemeral)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: default_workers(),
            grace: Duration::from_millis(30_000),
            ready_timeout: Duration::from_millis(10_000),
            ready_poll: Duration::from_millis(500),
            ready_url: None,
            health_url: None,
            health_interval: Duration::from_millis(10_000),
            health_threshold: 3,
            ipc_port: 0,
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Builds a configuration from defaults overlaid with `GPDD_*`
    /// environment variables. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>(ENV_WORKERS) {
            if n > 0 {
                cfg.workers = n;
            }
        }
        if let Some(ms) = env_parse::<u64>(ENV_GRACE_TIMEOUT) {
            cfg.grace = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>(ENV_READY_TIMEOUT) {
            cfg.ready_timeout = Duration::from_millis(ms);
        }
        if let Some(url) = env_string(ENV_READY_URL) {
            cfg.ready_url = Some(url);
        }
        if let Some(url) = env_string(ENV_HEALTH_URL) {
            cfg.health_url = Some(url);
        }
        if let Some(port) = env_parse::<u16>(ENV_IPC_PORT) {
            cfg.ipc_port = port;
        }

        cfg
    }
}

/// Pool size fallback when neither the CLI nor `GPDD_WORKERS` decides.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.grace, Duration::from_millis(30_000));
        assert_eq!(cfg.ready_timeout, Duration::from_millis(10_000));
        assert_eq!(cfg.ready_poll, Duration::from_millis(500));
        assert_eq!(cfg.ipc_port, 0);
        assert!(cfg.ready_url.is_none());
    }

    #[test]
    fn environment_overrides_are_applied() {
        std::env::set_var(ENV_WORKERS, "7");
        std::env::set_var(ENV_GRACE_TIMEOUT, "1500");
        std::env::set_var(ENV_READY_URL, "http://127.0.0.1:9999/healthz");

        let cfg = Config::from_env();
        assert_eq!(cfg.workers, 7);
        assert_eq!(cfg.grace, Duration::from_millis(1500));
        assert_eq!(
            cfg.ready_url.as_deref(),
            Some("http://127.0.0.1:9999/healthz")
        );

        std::env::remove_var(ENV_WORKERS);
        std::env::remove_var(ENV_GRACE_TIMEOUT);
        std::env::remove_var(ENV_READY_URL);
    }

    #[test]
    fn garbage_environment_values_fall_back() {
        std::env::set_var(ENV_IPC_PORT, "not-a-port");
        let cfg = Config::from_env();
        assert_eq!(cfg.ipc_port, 0);
        std::env::remove_var(ENV_IPC_PORT);
    }
}
