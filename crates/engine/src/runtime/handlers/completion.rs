// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion reports, retries, and cancellation.

use crate::error::RuntimeError;
use crate::runtime::Runtime;
use cortex_core::task::TaskState;
use cortex_core::{Clock, Event, IdGen, TaskId, WorkerId};

impl<C: Clock, I: IdGen> Runtime<C, I> {
    /// Handle a completion or failure report from a worker.
    ///
    /// A report for an already-terminal task is a state conflict, not a
    /// corruption; a report from a worker that does not own the task is
    /// refused the same way.
    pub fn report(
        &self,
        worker_id: &str,
        task_id: &str,
        success: bool,
        detail: Option<String>,
    ) -> Result<Event, RuntimeError> {
        let (task_id, worker_id) = self.lock_state(|st| {
            let task = st
                .get_task(task_id)
                .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;
            if task.is_terminal() {
                return Err(RuntimeError::StateConflict(format!(
                    "task {} is already {}",
                    task.id, task.state
                )));
            }
            let worker = st
                .get_worker(worker_id)
                .ok_or_else(|| RuntimeError::WorkerNotFound(worker_id.to_string()))?;
            if task.worker_id.as_ref() != Some(&worker.id) {
                return Err(RuntimeError::TaskNotAssigned(task.id.to_string()));
            }
            Ok((task.id.clone(), worker.id.clone()))
        })?;

        let at_ms = self.epoch_ms();
        let event = if success {
            Event::TaskCompleted {
                task_id,
                worker_id,
                detail,
                at_ms,
            }
        } else {
            Event::TaskFailureReported {
                task_id,
                worker_id,
                reason: detail.unwrap_or_else(|| "worker-reported-failure".to_string()),
                at_ms,
            }
        };
        Ok(event)
    }

    /// Request cancellation of a task.
    ///
    /// Returns whether the cancel is pending worker confirmation (true for
    /// a task that is already running).
    pub fn cancel(&self, task_id: &str) -> Result<(bool, Event), RuntimeError> {
        let (task_id, pending) = self.lock_state(|st| {
            let task = st
                .get_task(task_id)
                .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;
            if task.is_terminal() {
                return Err(RuntimeError::StateConflict(format!(
                    "task {} is already {}",
                    task.id, task.state
                )));
            }
            let pending = matches!(task.state, TaskState::Assigned | TaskState::InProgress);
            Ok((task.id.clone(), pending))
        })?;

        let event = Event::TaskCancelRequested {
            task_id,
            at_ms: self.epoch_ms(),
        };
        Ok((pending, event))
    }

    /// Turn a worker failure report into a reassignment or terminal
    /// failure, depending on remaining retries.
    pub(crate) fn handle_failure_reported(
        &self,
        task_id: &TaskId,
        worker_id: &WorkerId,
        reason: &str,
        at_ms: u64,
        out: &mut Vec<Event>,
    ) {
        let retries = self.lock_state(|st| {
            st.tasks
                .get(task_id.as_str())
                .filter(|t| !t.is_terminal() && t.worker_id.as_ref() == Some(worker_id))
                .map(|t| (t.retry_count, t.max_retries, t.cancel_deadline_ms.is_some()))
        });
        let Some((retry_count, max_retries, cancelling)) = retries else {
            return;
        };

        // A failure report while a cancel is pending confirms the cancel
        if cancelling {
            self.emit(
                out,
                Event::TaskCancelled {
                    task_id: task_id.clone(),
                    at_ms,
                },
            );
            return;
        }

        if retry_count < max_retries {
            tracing::info!(task = %task_id, worker = %worker_id, reason, "requeueing failed task");
            self.emit(
                out,
                Event::TaskReassigned {
                    task_id: task_id.clone(),
                    from_worker: worker_id.clone(),
                    retry_count: retry_count + 1,
                    at_ms,
                },
            );
        } else {
            self.emit(
                out,
                Event::TaskFailed {
                    task_id: task_id.clone(),
                    reason: "exhausted-retries".to_string(),
                    worker_id: Some(worker_id.clone()),
                    at_ms,
                },
            );
        }
    }

    /// Resolve a cancel request against the task's current state.
    pub(crate) fn handle_cancel_requested(
        &self,
        task_id: &TaskId,
        at_ms: u64,
        out: &mut Vec<Event>,
    ) {
        let state = self.lock_state(|st| st.tasks.get(task_id.as_str()).map(|t| t.state));
        match state {
            Some(TaskState::Queued) => {
                self.emit(
                    out,
                    Event::TaskCancelled {
                        task_id: task_id.clone(),
                        at_ms,
                    },
                );
            }
            Some(TaskState::Assigned) | Some(TaskState::InProgress) => {
                // Best-effort cancel: the owning worker sees the event on
                // the push channel; the TTL sweep enforces the deadline.
                self.emit(
                    out,
                    Event::TaskCancelling {
                        task_id: task_id.clone(),
                        deadline_ms: at_ms + self.config.dispatch_grace_ms,
                    },
                );
            }
            _ => {}
        }
    }
}
