// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the coordination engine.
//!
//! The daemon's engine loop feeds every WAL event through
//! [`Runtime::handle_event`]. Handlers eagerly apply their result events to
//! the materialized state (for immediate visibility) and return them for
//! persistence; `apply_event` is idempotent, so the second application when
//! those events return from the WAL is harmless.

mod handlers;

use crate::error::RuntimeError;
use crate::metrics::Metrics;
use crate::router::{Router, RouterConfig};
use crate::validator::Validator;
use cortex_core::{Clock, CoordinatorConfig, Event, IdGen, Priority, TaskId, UuidIdGen, WorkerId};
use cortex_storage::MaterializedState;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use handlers::admission::{AdmitOutcome, SubmitRequest};
pub use handlers::worker::HeartbeatAck;

/// Runtime that coordinates the system.
pub struct Runtime<C: Clock, I: IdGen = UuidIdGen> {
    state: Arc<Mutex<MaterializedState>>,
    pub(crate) router: Router,
    pub(crate) validator: Validator,
    pub(crate) config: CoordinatorConfig,
    clock: C,
    pub(crate) id_gen: I,
    metrics: Arc<Metrics>,
}

impl<C: Clock> Runtime<C, UuidIdGen> {
    /// Create a runtime with the production UUID id generator.
    pub fn new(state: Arc<Mutex<MaterializedState>>, config: CoordinatorConfig, clock: C) -> Self {
        Self::with_id_gen(state, config, clock, UuidIdGen)
    }
}

impl<C: Clock, I: IdGen> Runtime<C, I> {
    /// Create a runtime with a custom id generator (for testing).
    pub fn with_id_gen(
        state: Arc<Mutex<MaterializedState>>,
        config: CoordinatorConfig,
        clock: C,
        id_gen: I,
    ) -> Self {
        Self {
            state,
            router: Router::new(RouterConfig::from(&config)),
            validator: Validator::new(config.validator.clone()),
            clock,
            id_gen,
            metrics: Arc::new(Metrics::new()),
            config,
        }
    }

    pub fn state(&self) -> Arc<Mutex<MaterializedState>> {
        Arc::clone(&self.state)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Helper to read state under the lock.
    pub(crate) fn lock_state<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let guard = self.state.lock();
        f(&guard)
    }

    /// Apply a result event eagerly and queue it for persistence.
    pub(crate) fn emit(&self, out: &mut Vec<Event>, event: Event) {
        {
            let mut state = self.state.lock();
            state.apply_event(&event);
        }
        out.push(event);
    }

    pub(crate) fn epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Process one event from the engine loop, returning result events.
    ///
    /// The incoming event has already been applied to the materialized
    /// state by the caller; this reacts to it.
    pub fn handle_event(&self, event: &Event) -> Result<Vec<Event>, RuntimeError> {
        let mut out = Vec::new();

        match event {
            // New capacity or new work: run the dispatch loop
            Event::WorkerRegistered { .. }
            | Event::TaskAdmitted { .. }
            | Event::TaskExpired { .. }
            | Event::TaskCancelled { .. } => {
                self.try_dispatch(&mut out);
            }

            Event::TaskFailed { worker_id, .. } => {
                if let Some(worker_id) = worker_id {
                    self.drain_check(worker_id, &mut out);
                }
                self.try_dispatch(&mut out);
            }

            Event::WorkerHeartbeat {
                worker_id,
                progress,
                at_ms,
                ..
            } => {
                self.handle_heartbeat_progress(worker_id, progress, *at_ms, &mut out);
            }

            Event::WorkerTimeout { worker_id, at_ms } => {
                self.release_worker_tasks(worker_id, *at_ms, &mut out);
                self.try_dispatch(&mut out);
            }

            Event::WorkerDraining { worker_id, .. } => {
                self.drain_check(worker_id, &mut out);
            }

            Event::TaskCompleted { worker_id, .. } => {
                self.drain_check(worker_id, &mut out);
                self.try_dispatch(&mut out);
            }

            Event::TaskReassigned { from_worker, .. } => {
                self.drain_check(from_worker, &mut out);
                self.try_dispatch(&mut out);
            }

            Event::TaskFailureReported {
                task_id,
                worker_id,
                reason,
                at_ms,
            } => {
                self.handle_failure_reported(task_id, worker_id, reason, *at_ms, &mut out);
            }

            Event::TaskCancelRequested { task_id, at_ms } => {
                self.handle_cancel_requested(task_id, *at_ms, &mut out);
            }

            // Pure notifications and already-applied state changes
            Event::WorkerLate { .. }
            | Event::WorkerUnregistered { .. }
            | Event::TaskRejected { .. }
            | Event::TaskAssigned { .. }
            | Event::TaskProgress { .. }
            | Event::TaskCancelling { .. }
            | Event::TaskPruned { .. }
            | Event::SnapshotCreated { .. }
            | Event::RecoveryCompleted { .. }
            | Event::DegradedModeEntered { .. }
            | Event::DegradedModeExited
            | Event::LostEvents { .. }
            | Event::Shutdown
            | Event::Custom => {}
        }

        Ok(out)
    }

    /// Build a fresh task id.
    pub(crate) fn next_task_id(&self) -> TaskId {
        TaskId::new(format!("task-{}", self.id_gen.next()))
    }

    /// Build a fresh worker id.
    pub(crate) fn next_worker_id(&self) -> WorkerId {
        WorkerId::new(format!("wkr-{}", self.id_gen.next()))
    }
}

/// Effective submission parameters with defaults resolved.
#[derive(Debug, Clone)]
pub(crate) struct AdmissionDefaults {
    pub priority: Priority,
    pub ttl_ms: u64,
    pub max_retries: u32,
}

impl AdmissionDefaults {
    pub(crate) fn resolve(config: &CoordinatorConfig, req: &SubmitRequest) -> Self {
        Self {
            priority: req.priority.unwrap_or_default(),
            ttl_ms: req.ttl_ms.unwrap_or(config.default_ttl_ms),
            max_retries: req.max_retries.unwrap_or(config.default_max_retries),
        }
    }
}

/// Score map alias used across admission and routing.
pub(crate) type ScoreVector = BTreeMap<String, f64>;

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
