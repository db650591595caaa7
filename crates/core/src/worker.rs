// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker record, lifecycle, and heartbeat history.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

crate::define_id! {
    /// Unique identifier for a worker instance, assigned at registration.
    pub struct WorkerId;
}

/// Number of heartbeat records retained per worker; oldest overwritten.
pub const HEARTBEAT_LOG_CAPACITY: usize = 32;

/// Lifecycle state of a worker.
///
/// `Registering → Idle ↔ Busy → Draining → Unregistered`, with the abnormal
/// branch `Idle/Busy → TimedOut`. A timed-out worker is never revived; it
/// must register again under a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Transient state while a registration is being recorded.
    Registering,
    Idle,
    Busy,
    Draining,
    TimedOut,
    Unregistered,
}

impl WorkerState {
    /// Whether a worker in this state may appear in the routing candidate set.
    pub fn admissible(&self) -> bool {
        matches!(self, WorkerState::Idle | WorkerState::Busy)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Registering => "registering",
            WorkerState::Idle => "idle",
            WorkerState::Busy => "busy",
            WorkerState::Draining => "draining",
            WorkerState::TimedOut => "timed_out",
            WorkerState::Unregistered => "unregistered",
        };
        write!(f, "{s}")
    }
}

/// Status a worker declares about itself in a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatStatus {
    Idle,
    Busy,
    Degraded,
}

/// One heartbeat observation, kept in a bounded per-worker ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub at_ms: u64,
    pub status: BeatStatus,
    /// Declared progress per task id, 0-100.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub progress: BTreeMap<String, u8>,
}

/// A worker record as held by the materialized state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    /// Declared capability tags; routing matches these against categories.
    pub capabilities: BTreeSet<String>,
    /// Count of currently assigned tasks.
    #[serde(default)]
    pub load: u32,
    pub max_concurrent: u32,
    pub state: WorkerState,
    pub registered_at_ms: u64,
    pub last_heartbeat_ms: u64,
    /// Used to break ties toward the longest-idle worker.
    #[serde(default)]
    pub last_assigned_at_ms: u64,
    /// Deadline by which a draining worker's tasks are forcibly reassigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_deadline_ms: Option<u64>,
    #[serde(default)]
    pub heartbeats: VecDeque<HeartbeatRecord>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        capabilities: impl IntoIterator<Item = String>,
        max_concurrent: u32,
        registered_at_ms: u64,
    ) -> Self {
        Self {
            id,
            capabilities: capabilities.into_iter().collect(),
            load: 0,
            max_concurrent,
            state: WorkerState::Idle,
            registered_at_ms,
            last_heartbeat_ms: registered_at_ms,
            last_assigned_at_ms: 0,
            drain_deadline_ms: None,
            heartbeats: VecDeque::new(),
        }
    }

    /// Record a heartbeat in the bounded ring, evicting the oldest entry.
    pub fn push_heartbeat(&mut self, record: HeartbeatRecord) {
        if self.heartbeats.len() == HEARTBEAT_LOG_CAPACITY {
            self.heartbeats.pop_front();
        }
        self.heartbeats.push_back(record);
        self.last_heartbeat_ms = self
            .heartbeats
            .back()
            .map(|r| r.at_ms)
            .unwrap_or(self.last_heartbeat_ms);
    }

    /// Re-derive Idle/Busy from the load counter. Only meaningful while the
    /// worker is in a routable state; Draining and terminal states stick.
    pub fn sync_state(&mut self) {
        if self.state.admissible() {
            self.state = if self.load > 0 {
                WorkerState::Busy
            } else {
                WorkerState::Idle
            };
        }
    }

    /// Whether this worker can accept one more task.
    pub fn has_capacity(&self) -> bool {
        self.state.admissible() && self.load < self.max_concurrent
    }

    /// Milliseconds since the last heartbeat.
    pub fn silent_for_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heartbeat_ms)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
