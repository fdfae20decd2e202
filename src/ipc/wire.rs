//! JSON bodies of the loopback contract. Field names are part of the
//! external interface; timestamps are Unix epoch milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::{WorkerId, WorkerInfo, WorkerState};

/// `GET /status` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStatus {
    /// Resolved path of the worker binary.
    #[serde(rename = "appFile")]
    pub app_file: String,
    /// Master start time, epoch milliseconds.
    #[serde(rename = "startTime")]
    pub start_time: u64,
    /// One entry per tracked worker, ordered by id.
    pub workers: Vec<WorkerStatus>,
}

/// One worker row in [`RuntimeStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub id: WorkerId,
    pub pid: u32,
    pub state: WorkerState,
    /// Fork time, epoch milliseconds.
    #[serde(rename = "startTime")]
    pub start_time: u64,
}

impl From<WorkerInfo> for WorkerStatus {
    fn from(info: WorkerInfo) -> Self {
        Self {
            id: info.id,
            pid: info.pid,
            state: info.state,
            start_time: epoch_millis(info.started_at),
        }
    }
}

/// Acknowledgement body for command endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    pub command: String,
}

impl Ack {
    pub fn new(command: &str) -> Self {
        Self {
            ok: true,
            command: command.to_string(),
        }
    }
}

/// Error body for 404/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Epoch milliseconds for wire timestamps.
pub(crate) fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_contract_field_names() {
        let status = RuntimeStatus {
            app_file: "/srv/app".into(),
            start_time: 1_700_000_000_000,
            workers: vec![WorkerStatus {
                id: 1,
                pid: 4242,
                state: WorkerState::Ready,
                start_time: 1_700_000_000_500,
            }],
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["appFile"], "/srv/app");
        assert_eq!(json["startTime"], 1_700_000_000_000u64);
        assert_eq!(json["workers"][0]["state"], "ready");
        assert_eq!(json["workers"][0]["startTime"], 1_700_000_000_500u64);
    }

    #[test]
    fn states_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkerState::Draining).unwrap(),
            "\"draining\""
        );
    }
}
