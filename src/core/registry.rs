//! # Worker registry: the in-memory worker table.
//!
//! [`WorkerRegistry`] tracks one [`WorkerInfo`] per live child process,
//! keyed by a monotonically increasing worker id that is never reused
//! within a master lifetime.
//!
//! ## State machine
//! ```text
//! insert ──► starting ──mark_ready──► ready ──mark_draining──► draining
//!                │                                                 │
//!                └──────────────mark_draining─────────────────────►│
//!                                                                  ▼
//!                                   remove (observed exit) ◄───────┘
//! ```
//!
//! ## Rules
//! - The supervisor is the **only writer**; readers (IPC surface, tests)
//!   consume [`snapshot`](WorkerRegistry::snapshot) under the same lock, so
//!   torn views are impossible.
//! - `mark_ready` applies only to `starting` workers; a late readiness
//!   signal cannot resurrect a worker already asked to drain.
//! - Entries leave the table only through `remove`, driven by an observed
//!   exit or a force-kill.
//! - The map is ordered by id, so "oldest worker" is the first key.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Monotonic worker identifier assigned by the supervisor.
pub type WorkerId = u64;

/// Lifecycle state of a worker process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Forked, accept loop not yet confirmed.
    Starting,
    /// Accept loop confirmed serving (in-band token or probe).
    Ready,
    /// Asked to retire; finishing in-flight work before exit.
    Draining,
}

/// One tracked worker process.
#[derive(Clone, Debug)]
pub struct WorkerInfo {
    /// Monotonic id, never recycled.
    pub id: WorkerId,
    /// Operating-system pid of the child.
    pub pid: u32,
    /// Current lifecycle state.
    pub state: WorkerState,
    /// Wall time at fork.
    pub started_at: SystemTime,
}

/// In-memory table of live workers.
pub struct WorkerRegistry {
    workers: RwLock<BTreeMap<WorkerId, WorkerInfo>>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Records a freshly forked worker as `starting`.
    pub async fn insert(&self, id: WorkerId, pid: u32, started_at: SystemTime) {
        let mut map = self.workers.write().await;
        map.insert(
            id,
            WorkerInfo {
                id,
                pid,
                state: WorkerState::Starting,
                started_at,
            },
        );
    }

    /// Marks a `starting` worker as `ready`.
    ///
    /// Returns `true` if the state changed. Draining workers and unknown
    /// ids are left untouched.
    pub async fn mark_ready(&self, id: WorkerId) -> bool {
        let mut map = self.workers.write().await;
        match map.get_mut(&id) {
            Some(info) if info.state == WorkerState::Starting => {
                info.state = WorkerState::Ready;
                true
            }
            _ => false,
        }
    }

    /// Marks a worker as `draining`.
    ///
    /// Returns `true` if the state changed (the worker existed and was not
    /// already draining).
    pub async fn mark_draining(&self, id: WorkerId) -> bool {
        let mut map = self.workers.write().await;
        match map.get_mut(&id) {
            Some(info) if info.state != WorkerState::Draining => {
                info.state = WorkerState::Draining;
                true
            }
            _ => false,
        }
    }

    /// Removes a worker after its exit was observed (or forced).
    pub async fn remove(&self, id: WorkerId) -> Option<WorkerInfo> {
        self.workers.write().await.remove(&id)
    }

    /// Looks a worker up by child pid.
    pub async fn by_pid(&self, pid: u32) -> Option<WorkerInfo> {
        let map = self.workers.read().await;
        map.values().find(|w| w.pid == pid).cloned()
    }

    /// Returns the current lifecycle state of a worker.
    pub async fn state(&self, id: WorkerId) -> Option<WorkerState> {
        self.workers.read().await.get(&id).map(|w| w.state)
    }

    /// True if the worker is still tracked.
    pub async fn contains(&self, id: WorkerId) -> bool {
        self.workers.read().await.contains_key(&id)
    }

    /// Consistent copy of the whole table, ordered by id.
    pub async fn snapshot(&self) -> Vec<WorkerInfo> {
        self.workers.read().await.values().cloned().collect()
    }

    /// Worker ids in ascending order.
    pub async fn ids(&self) -> Vec<WorkerId> {
        self.workers.read().await.keys().copied().collect()
    }

    /// Ids of workers still in `starting`.
    pub async fn starting_ids(&self) -> Vec<WorkerId> {
        let map = self.workers.read().await;
        map.values()
            .filter(|w| w.state == WorkerState::Starting)
            .map(|w| w.id)
            .collect()
    }

    /// Lowest tracked id (the oldest worker), if any.
    pub async fn oldest(&self) -> Option<WorkerId> {
        self.workers.read().await.keys().next().copied()
    }

    /// Number of tracked workers.
    pub async fn size(&self) -> usize {
        self.workers.read().await.len()
    }

    /// True if no workers are tracked.
    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
