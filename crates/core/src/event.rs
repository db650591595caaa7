// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the coordination daemon.
//!
//! Every state mutation is an event. Events are appended to the WAL before
//! the engine applies them, and the push channel fans the public subset out
//! to subscribers. Events carry their own timestamps so that WAL replay
//! reproduces the exact state that existed before a crash.

use crate::task::{Priority, TaskId};
use crate::worker::{BeatStatus, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Events that trigger state transitions in the system.
///
/// Serializes with `{"type": "kind-name", ...fields}` format. Unknown type
/// tags deserialize to `Custom` so newer WALs stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- worker --
    #[serde(rename = "worker-registered")]
    WorkerRegistered {
        worker_id: WorkerId,
        capabilities: Vec<String>,
        max_concurrent: u32,
        at_ms: u64,
    },

    /// Liveness signal from a worker. Internal: recorded in the WAL but not
    /// fanned out to subscribers.
    #[serde(rename = "worker-heartbeat")]
    WorkerHeartbeat {
        worker_id: WorkerId,
        status: BeatStatus,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        progress: BTreeMap<String, u8>,
        at_ms: u64,
    },

    /// Heartbeat overdue past the warning threshold; no state change.
    #[serde(rename = "worker-late")]
    WorkerLate { worker_id: WorkerId, silent_ms: u64 },

    #[serde(rename = "worker-timeout")]
    WorkerTimeout { worker_id: WorkerId, at_ms: u64 },

    /// Graceful unregistration started; the worker refuses new assignments
    /// while finishing its in-flight tasks.
    #[serde(rename = "worker-draining")]
    WorkerDraining {
        worker_id: WorkerId,
        deadline_ms: u64,
    },

    #[serde(rename = "worker-unregistered")]
    WorkerUnregistered { worker_id: WorkerId },

    // -- task --
    #[serde(rename = "task-admitted")]
    TaskAdmitted {
        task_id: TaskId,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        declared_type: Option<String>,
        #[serde(default)]
        priority: Priority,
        ttl_ms: u64,
        max_retries: u32,
        /// Confidence per expert category, computed at admission.
        #[serde(default)]
        scores: BTreeMap<String, f64>,
        category: String,
        /// Admitted but marked for review by the input validator.
        #[serde(default)]
        flagged: bool,
        at_ms: u64,
    },

    #[serde(rename = "task-rejected")]
    TaskRejected {
        task_id: TaskId,
        reason: String,
        threats: Vec<String>,
        at_ms: u64,
    },

    #[serde(rename = "task-assigned")]
    TaskAssigned {
        task_id: TaskId,
        worker_id: WorkerId,
        at_ms: u64,
    },

    /// Task released back into the queue after its worker failed or timed
    /// out. Carries the post-increment retry count so replay is exact.
    #[serde(rename = "task-reassigned")]
    TaskReassigned {
        task_id: TaskId,
        from_worker: WorkerId,
        retry_count: u32,
        at_ms: u64,
    },

    /// Progress declared by the owning worker; the first progress report
    /// moves the task from Assigned to InProgress.
    #[serde(rename = "task-progress")]
    TaskProgress {
        task_id: TaskId,
        worker_id: WorkerId,
        percent: u8,
        at_ms: u64,
    },

    #[serde(rename = "task-completed")]
    TaskCompleted {
        task_id: TaskId,
        worker_id: WorkerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        at_ms: u64,
    },

    #[serde(rename = "task-failed")]
    TaskFailed {
        task_id: TaskId,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worker_id: Option<WorkerId>,
        at_ms: u64,
    },

    #[serde(rename = "task-expired")]
    TaskExpired { task_id: TaskId, at_ms: u64 },

    /// Cancel requested by a client. Internal: the engine decides whether
    /// this becomes an immediate cancel or a grace-period cancel.
    #[serde(rename = "task-cancel-requested")]
    TaskCancelRequested { task_id: TaskId, at_ms: u64 },

    /// Best-effort cancel sent to the owning worker; if the worker does not
    /// confirm before the deadline, the task is failed with `cancel-forced`.
    #[serde(rename = "task-cancelling")]
    TaskCancelling { task_id: TaskId, deadline_ms: u64 },

    #[serde(rename = "task-cancelled")]
    TaskCancelled { task_id: TaskId, at_ms: u64 },

    /// Failure reported by the owning worker. Internal: the engine turns
    /// this into a reassignment or a terminal failure depending on retries.
    #[serde(rename = "task-failure-reported")]
    TaskFailureReported {
        task_id: TaskId,
        worker_id: WorkerId,
        reason: String,
        at_ms: u64,
    },

    /// Terminal task removed from state after its retention window.
    #[serde(rename = "task-pruned")]
    TaskPruned { task_id: TaskId },

    // -- daemon --
    #[serde(rename = "snapshot-created")]
    SnapshotCreated { seq: u64, size_bytes: u64 },

    #[serde(rename = "recovery-completed")]
    RecoveryCompleted { snapshot_seq: u64, replayed: u64 },

    #[serde(rename = "degraded-mode-entered")]
    DegradedModeEntered { reason: String },

    #[serde(rename = "degraded-mode-exited")]
    DegradedModeExited,

    /// Synthesized per subscriber when its buffer overflowed; `dropped`
    /// counts the events lost since the last delivered one.
    #[serde(rename = "lost-events")]
    LostEvents { dropped: u64 },

    #[serde(rename = "shutdown")]
    Shutdown,

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::WorkerRegistered { .. } => "worker-registered",
            Event::WorkerHeartbeat { .. } => "worker-heartbeat",
            Event::WorkerLate { .. } => "worker-late",
            Event::WorkerTimeout { .. } => "worker-timeout",
            Event::WorkerDraining { .. } => "worker-draining",
            Event::WorkerUnregistered { .. } => "worker-unregistered",
            Event::TaskAdmitted { .. } => "task-admitted",
            Event::TaskRejected { .. } => "task-rejected",
            Event::TaskAssigned { .. } => "task-assigned",
            Event::TaskReassigned { .. } => "task-reassigned",
            Event::TaskProgress { .. } => "task-progress",
            Event::TaskCompleted { .. } => "task-completed",
            Event::TaskFailed { .. } => "task-failed",
            Event::TaskExpired { .. } => "task-expired",
            Event::TaskCancelRequested { .. } => "task-cancel-requested",
            Event::TaskCancelling { .. } => "task-cancelling",
            Event::TaskCancelled { .. } => "task-cancelled",
            Event::TaskFailureReported { .. } => "task-failure-reported",
            Event::TaskPruned { .. } => "task-pruned",
            Event::SnapshotCreated { .. } => "snapshot-created",
            Event::RecoveryCompleted { .. } => "recovery-completed",
            Event::DegradedModeEntered { .. } => "degraded-mode-entered",
            Event::DegradedModeExited => "degraded-mode-exited",
            Event::LostEvents { .. } => "lost-events",
            Event::Shutdown => "shutdown",
            Event::Custom => "custom",
        }
    }

    /// Subject id for per-subject delivery ordering.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Event::WorkerRegistered { worker_id, .. }
            | Event::WorkerHeartbeat { worker_id, .. }
            | Event::WorkerLate { worker_id, .. }
            | Event::WorkerTimeout { worker_id, .. }
            | Event::WorkerDraining { worker_id, .. }
            | Event::WorkerUnregistered { worker_id } => Some(worker_id.as_str()),
            Event::TaskAdmitted { task_id, .. }
            | Event::TaskRejected { task_id, .. }
            | Event::TaskAssigned { task_id, .. }
            | Event::TaskReassigned { task_id, .. }
            | Event::TaskProgress { task_id, .. }
            | Event::TaskCompleted { task_id, .. }
            | Event::TaskFailed { task_id, .. }
            | Event::TaskExpired { task_id, .. }
            | Event::TaskCancelRequested { task_id, .. }
            | Event::TaskCancelling { task_id, .. }
            | Event::TaskCancelled { task_id, .. }
            | Event::TaskFailureReported { task_id, .. }
            | Event::TaskPruned { task_id } => Some(task_id.as_str()),
            _ => None,
        }
    }

    /// Internal events are recorded in the WAL but never fanned out to
    /// push-channel subscribers.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Event::WorkerHeartbeat { .. }
                | Event::WorkerDraining { .. }
                | Event::TaskCancelRequested { .. }
                | Event::TaskCancelling { .. }
                | Event::TaskFailureReported { .. }
                | Event::TaskPruned { .. }
                | Event::Shutdown
                | Event::Custom
        )
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::WorkerRegistered {
                worker_id,
                max_concurrent,
                ..
            } => format!("{t} worker={worker_id} max={max_concurrent}"),
            Event::WorkerHeartbeat {
                worker_id, status, ..
            } => format!("{t} worker={worker_id} status={status:?}"),
            Event::WorkerLate {
                worker_id,
                silent_ms,
            } => format!("{t} worker={worker_id} silent_ms={silent_ms}"),
            Event::WorkerTimeout { worker_id, .. } => format!("{t} worker={worker_id}"),
            Event::WorkerDraining { worker_id, .. } => format!("{t} worker={worker_id}"),
            Event::WorkerUnregistered { worker_id } => format!("{t} worker={worker_id}"),
            Event::TaskAdmitted {
                task_id,
                category,
                priority,
                flagged,
                ..
            } => {
                if *flagged {
                    format!("{t} task={task_id} category={category} priority={priority} flagged")
                } else {
                    format!("{t} task={task_id} category={category} priority={priority}")
                }
            }
            Event::TaskRejected {
                task_id, reason, ..
            } => format!("{t} task={task_id} reason={reason}"),
            Event::TaskAssigned {
                task_id, worker_id, ..
            } => format!("{t} task={task_id} worker={worker_id}"),
            Event::TaskReassigned {
                task_id,
                from_worker,
                retry_count,
                ..
            } => format!("{t} task={task_id} from={from_worker} retry={retry_count}"),
            Event::TaskProgress {
                task_id, percent, ..
            } => format!("{t} task={task_id} percent={percent}"),
            Event::TaskCompleted {
                task_id, worker_id, ..
            } => format!("{t} task={task_id} worker={worker_id}"),
            Event::TaskFailed {
                task_id, reason, ..
            } => format!("{t} task={task_id} reason={reason}"),
            Event::TaskExpired { task_id, .. } => format!("{t} task={task_id}"),
            Event::TaskCancelRequested { task_id, .. } => format!("{t} task={task_id}"),
            Event::TaskCancelling { task_id, .. } => format!("{t} task={task_id}"),
            Event::TaskCancelled { task_id, .. } => format!("{t} task={task_id}"),
            Event::TaskFailureReported {
                task_id, worker_id, ..
            } => format!("{t} task={task_id} worker={worker_id}"),
            Event::TaskPruned { task_id } => format!("{t} task={task_id}"),
            Event::SnapshotCreated { seq, size_bytes } => {
                format!("{t} seq={seq} bytes={size_bytes}")
            }
            Event::RecoveryCompleted {
                snapshot_seq,
                replayed,
            } => format!("{t} seq={snapshot_seq} replayed={replayed}"),
            Event::DegradedModeEntered { reason } => format!("{t} reason={reason}"),
            Event::LostEvents { dropped } => format!("{t} dropped={dropped}"),
            Event::DegradedModeExited | Event::Shutdown | Event::Custom => t.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
