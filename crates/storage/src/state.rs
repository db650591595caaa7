// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.
//!
//! The authoritative in-memory data model: workers, tasks, and the queue of
//! admitted-but-unassigned tasks ordered by priority first, submission time
//! second. Every mutation arrives as an event; queries read a consistent
//! snapshot under the owning mutex.

use cortex_core::{
    task::TaskState,
    worker::{HeartbeatRecord, WorkerState},
    Event, Task, TaskId, Worker, WorkerId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-category routing outcome counters.
///
/// Feeds the router's historical-success tie-break and the metrics summary.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
}

impl CategoryStats {
    /// Fraction of finished tasks that completed, 0.0 with no history.
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.completed as f64 / finished as f64
        }
    }
}

/// Materialized state built from WAL events.
///
/// Collections are ordered maps so snapshot serialization is deterministic:
/// snapshot → load → snapshot produces byte-equivalent output.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedState {
    pub workers: BTreeMap<String, Worker>,
    pub tasks: BTreeMap<String, Task>,
    /// Admitted-but-unassigned task ids, priority first, submission second.
    #[serde(default)]
    pub queue: Vec<TaskId>,
    #[serde(default)]
    pub category_stats: BTreeMap<String, CategoryStats>,
}

impl MaterializedState {
    /// Get a task by ID or unique prefix (like git commit hashes)
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        if let Some(task) = self.tasks.get(id) {
            return Some(task);
        }
        let matches: Vec<_> = self.tasks.iter().filter(|(k, _)| k.starts_with(id)).collect();
        if matches.len() == 1 {
            Some(matches[0].1)
        } else {
            None
        }
    }

    /// Get a worker by ID or unique prefix
    pub fn get_worker(&self, id: &str) -> Option<&Worker> {
        if let Some(worker) = self.workers.get(id) {
            return Some(worker);
        }
        let matches: Vec<_> = self
            .workers
            .iter()
            .filter(|(k, _)| k.starts_with(id))
            .collect();
        if matches.len() == 1 {
            Some(matches[0].1)
        } else {
            None
        }
    }

    /// Task ids currently assigned to the given worker.
    pub fn tasks_of_worker(&self, worker_id: &WorkerId) -> Vec<TaskId> {
        let mut ids: Vec<_> = self
            .tasks
            .values()
            .filter(|t| t.worker_id.as_ref() == Some(worker_id) && !t.is_terminal())
            .map(|t| t.id.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Count of tasks currently Assigned or InProgress.
    pub fn in_flight_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| matches!(t.state, TaskState::Assigned | TaskState::InProgress))
            .count()
    }

    /// Insert a task into the queue at its priority position.
    ///
    /// Stable within a priority level: equal keys keep admission order.
    fn queue_insert(&mut self, task_id: &TaskId) {
        if self.queue.iter().any(|id| id == task_id) {
            return;
        }
        let new_key = match self.tasks.get(task_id.as_str()) {
            Some(t) => (t.priority, t.submitted_at_ms),
            None => return,
        };
        let tasks = &self.tasks;
        let pos = self
            .queue
            .iter()
            .position(|id| {
                tasks
                    .get(id.as_str())
                    .map(|t| (t.priority, t.submitted_at_ms) > new_key)
                    .unwrap_or(false)
            })
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, task_id.clone());
    }

    fn queue_remove(&mut self, task_id: &TaskId) {
        self.queue.retain(|id| id != task_id);
    }

    /// Decrement a worker's load, re-deriving Idle/Busy.
    fn release_worker(&mut self, worker_id: &WorkerId) {
        if let Some(worker) = self.workers.get_mut(worker_id.as_str()) {
            worker.load = worker.load.saturating_sub(1);
            worker.sync_state();
        }
    }

    /// Apply an event to derive state changes.
    ///
    /// # Idempotency Requirement
    ///
    /// **All event handlers MUST be idempotent.** Applying the same event
    /// twice must produce the same state as applying it once. Events are
    /// applied eagerly by the engine for immediate visibility and again when
    /// they return from the WAL, and WAL replay after a crash re-applies
    /// everything since the last snapshot.
    ///
    /// Guidelines:
    /// - Use assignment (`=`) instead of mutation (`+=`, `-=`)
    /// - Guard inserts with existence checks
    /// - Guard counters with state-transition checks
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            // -- worker events --
            Event::WorkerRegistered {
                worker_id,
                capabilities,
                max_concurrent,
                at_ms,
            } => {
                // Idempotency: registration ids are unique, skip if present
                if !self.workers.contains_key(worker_id.as_str()) {
                    self.workers.insert(
                        worker_id.as_str().to_string(),
                        Worker::new(
                            worker_id.clone(),
                            capabilities.iter().cloned(),
                            *max_concurrent,
                            *at_ms,
                        ),
                    );
                }
            }

            Event::WorkerHeartbeat {
                worker_id,
                status,
                progress,
                at_ms,
            } => {
                if let Some(worker) = self.workers.get_mut(worker_id.as_str()) {
                    // A timed-out worker is not revived by resumed heartbeats
                    if !matches!(
                        worker.state,
                        WorkerState::Idle | WorkerState::Busy | WorkerState::Draining
                    ) {
                        return;
                    }
                    // Idempotency: skip an exact duplicate of the last beat
                    if worker.heartbeats.back().map(|r| r.at_ms) == Some(*at_ms) {
                        return;
                    }
                    worker.push_heartbeat(HeartbeatRecord {
                        at_ms: *at_ms,
                        status: *status,
                        progress: progress.clone(),
                    });
                }
            }

            // Notification only; the worker keeps its state until timeout
            Event::WorkerLate { .. } => {}

            Event::WorkerTimeout { worker_id, .. } => {
                if let Some(worker) = self.workers.get_mut(worker_id.as_str()) {
                    if matches!(
                        worker.state,
                        WorkerState::Idle | WorkerState::Busy | WorkerState::Draining
                    ) {
                        worker.state = WorkerState::TimedOut;
                    }
                }
            }

            Event::WorkerDraining {
                worker_id,
                deadline_ms,
            } => {
                if let Some(worker) = self.workers.get_mut(worker_id.as_str()) {
                    if worker.state.admissible() {
                        worker.state = WorkerState::Draining;
                        worker.drain_deadline_ms = Some(*deadline_ms);
                    }
                }
            }

            Event::WorkerUnregistered { worker_id } => {
                self.workers.remove(worker_id.as_str());
            }

            // -- task events --
            Event::TaskAdmitted {
                task_id,
                description,
                declared_type,
                priority,
                ttl_ms,
                max_retries,
                scores,
                category,
                flagged,
                at_ms,
            } => {
                // Idempotency: skip if already admitted
                if !self.tasks.contains_key(task_id.as_str()) {
                    self.tasks.insert(
                        task_id.as_str().to_string(),
                        Task {
                            id: task_id.clone(),
                            description: description.clone(),
                            declared_type: declared_type.clone(),
                            priority: *priority,
                            state: TaskState::Queued,
                            scores: scores.clone(),
                            category: category.clone(),
                            worker_id: None,
                            excluded_worker: None,
                            retry_count: 0,
                            max_retries: *max_retries,
                            ttl_ms: *ttl_ms,
                            submitted_at_ms: *at_ms,
                            updated_at_ms: *at_ms,
                            finished_at_ms: None,
                            flagged: *flagged,
                            failure: None,
                            cancel_deadline_ms: None,
                        },
                    );
                    self.queue_insert(task_id);
                }
            }

            // Rejected submissions never become tasks
            Event::TaskRejected { .. } => {}

            Event::TaskAssigned {
                task_id,
                worker_id,
                at_ms,
            } => {
                let Some(task) = self.tasks.get_mut(task_id.as_str()) else {
                    return;
                };
                // Idempotency + stale guard: only a queued task can be assigned
                if task.state != TaskState::Queued {
                    return;
                }
                if !self.workers.contains_key(worker_id.as_str()) {
                    return;
                }
                task.worker_id = Some(worker_id.clone());
                task.state = TaskState::Assigned;
                task.updated_at_ms = *at_ms;
                let category = task.category.clone();
                self.queue_remove(task_id);
                if let Some(worker) = self.workers.get_mut(worker_id.as_str()) {
                    worker.load += 1;
                    worker.last_assigned_at_ms = *at_ms;
                    worker.sync_state();
                }
                self.category_stats.entry(category).or_default().dispatched += 1;
            }

            Event::TaskProgress {
                task_id,
                worker_id,
                at_ms,
                ..
            } => {
                if let Some(task) = self.tasks.get_mut(task_id.as_str()) {
                    if task.worker_id.as_ref() == Some(worker_id)
                        && matches!(task.state, TaskState::Assigned | TaskState::InProgress)
                    {
                        task.state = TaskState::InProgress;
                        task.updated_at_ms = *at_ms;
                    }
                }
            }

            Event::TaskCompleted {
                task_id,
                worker_id,
                at_ms,
                ..
            } => {
                let Some(task) = self.tasks.get_mut(task_id.as_str()) else {
                    return;
                };
                // Guard: completion only from an assigned state, by the owner
                if task.is_terminal() || task.worker_id.as_ref() != Some(worker_id) {
                    return;
                }
                task.state = TaskState::Completed;
                task.finished_at_ms = Some(*at_ms);
                task.updated_at_ms = *at_ms;
                task.cancel_deadline_ms = None;
                let owner = task.worker_id.take();
                let category = task.category.clone();
                if let Some(wid) = owner {
                    self.release_worker(&wid);
                }
                self.category_stats.entry(category).or_default().completed += 1;
            }

            Event::TaskFailed {
                task_id,
                reason,
                at_ms,
                ..
            } => {
                let Some(task) = self.tasks.get_mut(task_id.as_str()) else {
                    return;
                };
                if task.is_terminal() {
                    return;
                }
                task.state = TaskState::Failed;
                task.failure = Some(reason.clone());
                task.finished_at_ms = Some(*at_ms);
                task.updated_at_ms = *at_ms;
                task.cancel_deadline_ms = None;
                let owner = task.worker_id.take();
                let category = task.category.clone();
                self.queue_remove(task_id);
                if let Some(wid) = owner {
                    self.release_worker(&wid);
                }
                self.category_stats.entry(category).or_default().failed += 1;
            }

            Event::TaskReassigned {
                task_id,
                from_worker,
                retry_count,
                at_ms,
            } => {
                let Some(task) = self.tasks.get_mut(task_id.as_str()) else {
                    return;
                };
                if task.is_terminal() {
                    return;
                }
                // Idempotency: already requeued at this retry count
                if task.state == TaskState::Queued && task.retry_count == *retry_count {
                    return;
                }
                // Stale guard: ignore a release from a worker that no longer
                // owns the task
                if task.worker_id.is_some() && task.worker_id.as_ref() != Some(from_worker) {
                    return;
                }
                let release = task.worker_id.take().is_some();
                task.state = TaskState::Queued;
                task.retry_count = *retry_count;
                task.excluded_worker = Some(from_worker.clone());
                task.cancel_deadline_ms = None;
                task.updated_at_ms = *at_ms;
                if release {
                    self.release_worker(from_worker);
                }
                self.queue_insert(task_id);
            }

            Event::TaskExpired { task_id, at_ms } => {
                let Some(task) = self.tasks.get_mut(task_id.as_str()) else {
                    return;
                };
                if task.is_terminal() {
                    return;
                }
                task.state = TaskState::Expired;
                task.finished_at_ms = Some(*at_ms);
                task.updated_at_ms = *at_ms;
                task.cancel_deadline_ms = None;
                let owner = task.worker_id.take();
                self.queue_remove(task_id);
                if let Some(wid) = owner {
                    self.release_worker(&wid);
                }
            }

            // The engine decides whether this becomes an immediate cancel
            // or a grace-period cancel
            Event::TaskCancelRequested { .. } => {}

            Event::TaskCancelling {
                task_id,
                deadline_ms,
            } => {
                if let Some(task) = self.tasks.get_mut(task_id.as_str()) {
                    if !task.is_terminal() {
                        task.cancel_deadline_ms = Some(*deadline_ms);
                    }
                }
            }

            Event::TaskCancelled { task_id, at_ms } => {
                let Some(task) = self.tasks.get_mut(task_id.as_str()) else {
                    return;
                };
                if task.is_terminal() {
                    return;
                }
                task.state = TaskState::Cancelled;
                task.finished_at_ms = Some(*at_ms);
                task.updated_at_ms = *at_ms;
                task.cancel_deadline_ms = None;
                let owner = task.worker_id.take();
                self.queue_remove(task_id);
                if let Some(wid) = owner {
                    self.release_worker(&wid);
                }
            }

            // The engine translates failure reports into reassignment or
            // terminal failure depending on retries
            Event::TaskFailureReported { .. } => {}

            Event::TaskPruned { task_id } => {
                let terminal = self
                    .tasks
                    .get(task_id.as_str())
                    .map(|t| t.is_terminal())
                    .unwrap_or(false);
                if terminal {
                    self.tasks.remove(task_id.as_str());
                }
            }

            // Events that don't affect materialized state
            Event::SnapshotCreated { .. }
            | Event::RecoveryCompleted { .. }
            | Event::DegradedModeEntered { .. }
            | Event::DegradedModeExited
            | Event::LostEvents { .. }
            | Event::Shutdown
            | Event::Custom => {}
        }
    }

    /// Verify the cross-collection invariants. Used by tests.
    pub fn check_invariants(&self) -> Result<(), String> {
        // Worker load counters equal the number of tasks assigned to them
        for worker in self.workers.values() {
            let assigned = self
                .tasks
                .values()
                .filter(|t| t.worker_id.as_ref() == Some(&worker.id) && !t.is_terminal())
                .count() as u32;
            if worker.load != assigned {
                return Err(format!(
                    "worker {} load {} != assigned {}",
                    worker.id, worker.load, assigned
                ));
            }
        }

        // Non-null worker references resolve, and terminal tasks hold none
        for task in self.tasks.values() {
            if let Some(wid) = &task.worker_id {
                if task.is_terminal() {
                    return Err(format!("terminal task {} still holds {}", task.id, wid));
                }
                if !self.workers.contains_key(wid.as_str()) {
                    return Err(format!("task {} references unknown {}", task.id, wid));
                }
            }
            if task.retry_count > task.max_retries {
                return Err(format!(
                    "task {} retry_count {} > max {}",
                    task.id, task.retry_count, task.max_retries
                ));
            }
        }

        // Queue entries are exactly the Queued tasks, in priority order
        for id in &self.queue {
            match self.tasks.get(id.as_str()) {
                Some(t) if t.state == TaskState::Queued => {}
                Some(t) => return Err(format!("queued task {} in state {}", id, t.state)),
                None => return Err(format!("queue references unknown task {}", id)),
            }
        }
        for t in self.tasks.values() {
            if t.state == TaskState::Queued && !self.queue.iter().any(|id| id == &t.id) {
                return Err(format!("task {} queued but not in queue", t.id));
            }
        }
        let keys: Vec<_> = self
            .queue
            .iter()
            .filter_map(|id| self.tasks.get(id.as_str()))
            .map(|t| (t.priority, t.submitted_at_ms))
            .collect();
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err("queue out of priority order".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests/mod.rs"]
mod tests;
