// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::Event;
use crate::task::{Priority, TaskId};
use crate::worker::{BeatStatus, WorkerId};
use std::collections::BTreeMap;

// ── Event factory functions ─────────────────────────────────────────────────

pub fn register_event(worker_id: &str, capabilities: &[&str], max_concurrent: u32) -> Event {
    Event::WorkerRegistered {
        worker_id: WorkerId::new(worker_id),
        capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
        max_concurrent,
        at_ms: 1_000_000,
    }
}

pub fn heartbeat_event(worker_id: &str, at_ms: u64) -> Event {
    Event::WorkerHeartbeat {
        worker_id: WorkerId::new(worker_id),
        status: BeatStatus::Idle,
        progress: BTreeMap::new(),
        at_ms,
    }
}

pub fn admit_event(task_id: &str, description: &str, priority: Priority, at_ms: u64) -> Event {
    Event::TaskAdmitted {
        task_id: TaskId::new(task_id),
        description: description.to_string(),
        declared_type: None,
        priority,
        ttl_ms: 300_000,
        max_retries: 3,
        scores: BTreeMap::new(),
        category: "development".to_string(),
        flagged: false,
        at_ms,
    }
}

pub fn assign_event(task_id: &str, worker_id: &str, at_ms: u64) -> Event {
    Event::TaskAssigned {
        task_id: TaskId::new(task_id),
        worker_id: WorkerId::new(worker_id),
        at_ms,
    }
}

pub fn complete_event(task_id: &str, worker_id: &str, at_ms: u64) -> Event {
    Event::TaskCompleted {
        task_id: TaskId::new(task_id),
        worker_id: WorkerId::new(worker_id),
        detail: None,
        at_ms,
    }
}

pub fn reassign_event(task_id: &str, from_worker: &str, retry_count: u32, at_ms: u64) -> Event {
    Event::TaskReassigned {
        task_id: TaskId::new(task_id),
        from_worker: WorkerId::new(from_worker),
        retry_count,
        at_ms,
    }
}
