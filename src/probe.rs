//! # Single-shot transport probe.
//!
//! [`probe`] issues one HTTP GET against a URL with a bounded timeout and
//! reports whether **any** HTTP-level response came back. A 404 or 500 is a
//! reachable endpoint: the accept loop answered, which is all readiness
//! detection needs. Only transport-level failure (refused, reset, timeout,
//! TLS handshake) counts as unreachable.
//!
//! No retry happens at this level; callers own the cadence. Self-signed
//! server certificates are accepted, since the probed endpoints are
//! local-host.

use std::time::{Duration, Instant};

/// Result of one probe shot.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// HTTP status code, when an HTTP-level response was obtained.
    pub status: Option<u16>,
    /// Time from request start to outcome.
    pub latency: Duration,
    /// Transport-level failure description, when no response was obtained.
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// True when any HTTP-level response was obtained.
    pub fn reachable(&self) -> bool {
        self.status.is_some()
    }
}

/// Probes `url` once, bounded by `timeout`.
///
/// The response body is never interpreted; only the transport outcome and
/// status line matter.
pub async fn probe(url: &str, timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();

    let client = match reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            return ProbeOutcome {
                status: None,
                latency: started.elapsed(),
                error: Some(err.to_string()),
            };
        }
    };

    match client.get(url).send().await {
        Ok(resp) => ProbeOutcome {
            status: Some(resp.status().as_u16()),
            latency: started.elapsed(),
            error: None,
        },
        Err(err) => ProbeOutcome {
            status: None,
            latency: started.elapsed(),
            error: Some(err.to_string()),
        },
    }
}
