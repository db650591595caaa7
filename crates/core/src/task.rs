// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record and lifecycle types.

use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Unique identifier for a submitted task.
    pub struct TaskId;
}

/// Task priority. Lower ordinal means more urgent; the queue sorts by
/// priority first, submission time second.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    P0,
    P1,
    #[default]
    P2,
    P3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
        }
    }
}

/// Lifecycle state of a task.
///
/// `Submitted → Admitted → Queued → Assigned → InProgress` and from there to
/// one of the terminal states. A reassignment returns the task to `Queued`
/// with its retry counter incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Submitted,
    Admitted,
    Queued,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl TaskState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Expired | TaskState::Cancelled
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Admitted => "admitted",
            TaskState::Queued => "queued",
            TaskState::Assigned => "assigned",
            TaskState::InProgress => "in_progress",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Expired => "expired",
            TaskState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A task record as held by the materialized state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub state: TaskState,
    /// Confidence per expert category, computed at admission.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    /// Expert category chosen by the router at admission.
    pub category: String,
    /// Worker currently holding the task (Assigned / InProgress only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    /// Worker excluded from the next routing attempt after a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_worker: Option<WorkerId>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub ttl_ms: u64,
    pub submitted_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    /// Admitted but marked for review by the input validator.
    #[serde(default)]
    pub flagged: bool,
    /// Terminal failure reason (`exhausted-retries`, `cancel-forced`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Deadline for a best-effort cancel sent to the owning worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_deadline_ms: Option<u64>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True once the task has passed its time-to-live.
    ///
    /// The boundary itself is not yet expired; expiry needs strictly more
    /// elapsed time than the TTL.
    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.submitted_at_ms) > self.ttl_ms
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
