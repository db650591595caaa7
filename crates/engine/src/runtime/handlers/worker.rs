// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle: registration, heartbeats, graceful unregistration.

use crate::error::RuntimeError;
use crate::runtime::Runtime;
use cortex_core::worker::WorkerState;
use cortex_core::{BeatStatus, Clock, Event, IdGen, TaskId, WorkerId};
use std::collections::BTreeMap;

/// Heartbeat acknowledgement returned to the worker.
#[derive(Debug, Clone)]
pub struct HeartbeatAck {
    pub state: WorkerState,
    /// Tasks currently assigned to the worker; newly assigned ones are how
    /// a worker learns about its work.
    pub assignments: Vec<TaskId>,
}

impl<C: Clock, I: IdGen> Runtime<C, I> {
    /// Register a new worker.
    ///
    /// The requested concurrency is clamped to the configured per-worker
    /// ceiling.
    pub fn register(
        &self,
        capabilities: Vec<String>,
        max_concurrent: u32,
    ) -> Result<(WorkerId, Event), RuntimeError> {
        let worker_id = self.next_worker_id();
        let exists = self.lock_state(|state| state.workers.contains_key(worker_id.as_str()));
        if exists {
            return Err(RuntimeError::DuplicateWorker(worker_id.to_string()));
        }
        let max_concurrent = max_concurrent.clamp(1, self.config.max_tasks_per_worker);
        let event = Event::WorkerRegistered {
            worker_id: worker_id.clone(),
            capabilities,
            max_concurrent,
            at_ms: self.epoch_ms(),
        };
        Ok((worker_id, event))
    }

    /// Record a heartbeat and return the ack with current assignments.
    ///
    /// A timed-out worker is not revived; it gets an error telling it to
    /// re-register.
    pub fn heartbeat(
        &self,
        worker_id: &str,
        status: BeatStatus,
        progress: BTreeMap<String, u8>,
    ) -> Result<(HeartbeatAck, Event), RuntimeError> {
        let (id, state, assignments) = self.lock_state(|st| {
            let worker = st
                .get_worker(worker_id)
                .ok_or_else(|| RuntimeError::WorkerNotFound(worker_id.to_string()))?;
            if !matches!(
                worker.state,
                WorkerState::Idle | WorkerState::Busy | WorkerState::Draining
            ) {
                return Err(RuntimeError::WorkerExpired(worker_id.to_string()));
            }
            Ok((
                worker.id.clone(),
                worker.state,
                st.tasks_of_worker(&worker.id),
            ))
        })?;

        let event = Event::WorkerHeartbeat {
            worker_id: id,
            status,
            progress,
            at_ms: self.epoch_ms(),
        };
        Ok((HeartbeatAck { state, assignments }, event))
    }

    /// Begin graceful unregistration.
    ///
    /// A loaded worker drains: no new assignments, existing tasks complete
    /// up to the drain deadline. An idle worker unregisters immediately.
    pub fn unregister(&self, worker_id: &str) -> Result<(Vec<TaskId>, Event), RuntimeError> {
        let (id, outstanding) = self.lock_state(|st| {
            let worker = st
                .get_worker(worker_id)
                .ok_or_else(|| RuntimeError::WorkerNotFound(worker_id.to_string()))?;
            if !worker.state.admissible() {
                return Err(RuntimeError::StateConflict(format!(
                    "worker {} is {}",
                    worker.id, worker.state
                )));
            }
            Ok((worker.id.clone(), st.tasks_of_worker(&worker.id)))
        })?;

        let event = if outstanding.is_empty() {
            Event::WorkerUnregistered { worker_id: id }
        } else {
            Event::WorkerDraining {
                worker_id: id,
                deadline_ms: self.epoch_ms() + self.config.dispatch_grace_ms,
            }
        };
        Ok((outstanding, event))
    }

    /// Translate declared per-task progress into task-progress events.
    ///
    /// The first progress report for an assigned task moves it to
    /// InProgress; reports for tasks the worker does not own are dropped.
    pub(crate) fn handle_heartbeat_progress(
        &self,
        worker_id: &WorkerId,
        progress: &BTreeMap<String, u8>,
        at_ms: u64,
        out: &mut Vec<Event>,
    ) {
        if progress.is_empty() {
            return;
        }
        let owned: Vec<TaskId> = self.lock_state(|st| {
            progress
                .keys()
                .filter_map(|task_id| st.tasks.get(task_id.as_str()))
                .filter(|t| t.worker_id.as_ref() == Some(worker_id) && !t.is_terminal())
                .map(|t| t.id.clone())
                .collect()
        });
        for task_id in owned {
            let percent = progress.get(task_id.as_str()).copied().unwrap_or(0).min(100);
            self.emit(
                out,
                Event::TaskProgress {
                    task_id,
                    worker_id: worker_id.clone(),
                    percent,
                    at_ms,
                },
            );
        }
    }

    /// Release every task a dead worker held: requeue while retries remain,
    /// otherwise fail terminally.
    pub(crate) fn release_worker_tasks(
        &self,
        worker_id: &WorkerId,
        at_ms: u64,
        out: &mut Vec<Event>,
    ) {
        let held: Vec<(TaskId, u32, u32)> = self.lock_state(|st| {
            st.tasks_of_worker(worker_id)
                .into_iter()
                .filter_map(|id| st.tasks.get(id.as_str()))
                .map(|t| (t.id.clone(), t.retry_count, t.max_retries))
                .collect()
        });

        for (task_id, retry_count, max_retries) in held {
            if retry_count < max_retries {
                self.emit(
                    out,
                    Event::TaskReassigned {
                        task_id,
                        from_worker: worker_id.clone(),
                        retry_count: retry_count + 1,
                        at_ms,
                    },
                );
            } else {
                self.emit(
                    out,
                    Event::TaskFailed {
                        task_id,
                        reason: "exhausted-retries".to_string(),
                        worker_id: Some(worker_id.clone()),
                        at_ms,
                    },
                );
            }
        }
    }

    /// Finish unregistration once a draining worker's load reaches zero.
    pub(crate) fn drain_check(&self, worker_id: &WorkerId, out: &mut Vec<Event>) {
        let done = self.lock_state(|st| {
            st.workers
                .get(worker_id.as_str())
                .map(|w| w.state == WorkerState::Draining && w.load == 0)
                .unwrap_or(false)
        });
        if done {
            self.emit(
                out,
                Event::WorkerUnregistered {
                    worker_id: worker_id.clone(),
                },
            );
        }
    }
}
