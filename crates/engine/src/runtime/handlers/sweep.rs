// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic sweeps: heartbeat supervision, TTL, cancel grace, retention.
//!
//! Sweeps are pure detection; they read state and return events for the
//! daemon to persist. The resulting transitions happen when the engine
//! loop applies and handles those events, so a sweep never mutates state
//! directly.

use crate::runtime::Runtime;
use cortex_core::worker::WorkerState;
use cortex_core::{Clock, Event, IdGen, TaskId, WorkerId};

impl<C: Clock, I: IdGen> Runtime<C, I> {
    /// Heartbeat sweep, run every `heartbeat-check-interval`.
    ///
    /// A worker whose last heartbeat is exactly at the timeout boundary is
    /// not yet timed out; strictly more silence is required.
    pub fn sweep_heartbeats(&self, now_ms: u64) -> Vec<Event> {
        let config = &self.config;
        let mut out = Vec::new();

        self.lock_state(|st| {
            for worker in st.workers.values() {
                let silent = worker.silent_for_ms(now_ms);
                match worker.state {
                    WorkerState::Idle | WorkerState::Busy => {
                        if silent > config.heartbeat_timeout_ms {
                            out.push(Event::WorkerTimeout {
                                worker_id: worker.id.clone(),
                                at_ms: now_ms,
                            });
                        } else if silent > config.heartbeat_warning_ms {
                            out.push(Event::WorkerLate {
                                worker_id: worker.id.clone(),
                                silent_ms: silent,
                            });
                        }
                    }
                    WorkerState::Draining => {
                        if worker.load == 0 {
                            // Drain finished between completion events
                            out.push(Event::WorkerUnregistered {
                                worker_id: worker.id.clone(),
                            });
                            continue;
                        }
                        let deadline_passed = worker
                            .drain_deadline_ms
                            .map(|d| now_ms > d)
                            .unwrap_or(false);
                        if deadline_passed || silent > config.heartbeat_timeout_ms {
                            // Past the drain deadline the remaining tasks are
                            // forcibly released; timeout handling does both.
                            out.push(Event::WorkerTimeout {
                                worker_id: worker.id.clone(),
                                at_ms: now_ms,
                            });
                        }
                    }
                    WorkerState::TimedOut => {
                        // Completed lifecycle: drop the record once stale
                        if silent > config.task_retention_ms {
                            out.push(Event::WorkerUnregistered {
                                worker_id: worker.id.clone(),
                            });
                        }
                    }
                    WorkerState::Registering | WorkerState::Unregistered => {}
                }
            }
        });

        out
    }

    /// TTL sweep, run every `ttl-sweep-interval`.
    ///
    /// Expires overdue tasks, enforces cancel grace deadlines, and prunes
    /// terminal tasks past the retention window.
    pub fn sweep_ttl(&self, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        let retention = self.config.task_retention_ms;

        struct ForcedCancel {
            task_id: TaskId,
            worker_id: Option<WorkerId>,
            retry_count: u32,
            max_retries: u32,
        }

        let (expired, forced, pruned) = self.lock_state(|st| {
            let mut expired = Vec::new();
            let mut forced = Vec::new();
            let mut pruned = Vec::new();
            for task in st.tasks.values() {
                if task.is_terminal() {
                    let done_at = task.finished_at_ms.unwrap_or(task.updated_at_ms);
                    if now_ms.saturating_sub(done_at) > retention {
                        pruned.push(task.id.clone());
                    }
                    continue;
                }
                if task.expired(now_ms) {
                    expired.push(task.id.clone());
                    continue;
                }
                if task.cancel_deadline_ms.map(|d| now_ms > d).unwrap_or(false) {
                    forced.push(ForcedCancel {
                        task_id: task.id.clone(),
                        worker_id: task.worker_id.clone(),
                        retry_count: task.retry_count,
                        max_retries: task.max_retries,
                    });
                }
            }
            (expired, forced, pruned)
        });

        for task_id in expired {
            out.push(Event::TaskExpired {
                task_id,
                at_ms: now_ms,
            });
        }

        // The worker did not confirm the cancel within the grace period:
        // treat it like a worker failure, reassigning iff retries remain
        for cancel in forced {
            match cancel.worker_id {
                Some(worker_id) if cancel.retry_count < cancel.max_retries => {
                    out.push(Event::TaskReassigned {
                        task_id: cancel.task_id,
                        from_worker: worker_id,
                        retry_count: cancel.retry_count + 1,
                        at_ms: now_ms,
                    });
                }
                _ => {
                    out.push(Event::TaskFailed {
                        task_id: cancel.task_id,
                        reason: "cancel-forced".to_string(),
                        worker_id: cancel.worker_id,
                        at_ms: now_ms,
                    });
                }
            }
        }

        for task_id in pruned {
            out.push(Event::TaskPruned { task_id });
        }

        out
    }
}
