// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod admission;
mod completion;
mod dispatch;
mod sweeps;
mod worker_lifecycle;

use super::*;
use crate::runtime::handlers::admission::{AdmitOutcome, SubmitRequest};
use cortex_core::task::TaskState;
use cortex_core::worker::WorkerState;
use cortex_core::{BeatStatus, FakeClock, SequentialIdGen};
use std::collections::VecDeque;
use std::time::Duration;

type TestRuntime = Runtime<FakeClock, SequentialIdGen>;

/// In-process stand-in for the daemon engine loop: applies each event and
/// feeds handler result events back in until quiescent.
pub(super) struct Loop {
    pub runtime: TestRuntime,
    pub clock: FakeClock,
}

impl Loop {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let clock = FakeClock::new();
        let state = Arc::new(Mutex::new(MaterializedState::default()));
        let runtime =
            Runtime::with_id_gen(state, config, clock.clone(), SequentialIdGen::new("n"));
        Self { runtime, clock }
    }

    /// Process one event and everything it causes. Returns the full event
    /// log in processing order, seed included.
    pub fn pump(&self, seed: Event) -> Vec<Event> {
        let mut log = Vec::new();
        let mut pending = VecDeque::from([seed]);
        while let Some(event) = pending.pop_front() {
            {
                let state = self.runtime.state();
                let mut state = state.lock();
                state.apply_event(&event);
            }
            let results = self.runtime.handle_event(&event).unwrap();
            pending.extend(results);
            log.push(event);
        }
        log
    }

    pub fn register(&self, capabilities: &[&str], max_concurrent: u32) -> WorkerId {
        let caps = capabilities.iter().map(|s| s.to_string()).collect();
        let (worker_id, event) = self.runtime.register(caps, max_concurrent).unwrap();
        self.pump(event);
        worker_id
    }

    pub fn submit(&self, description: &str) -> TaskId {
        self.submit_request(SubmitRequest {
            description: description.to_string(),
            ..SubmitRequest::default()
        })
    }

    pub fn submit_request(&self, req: SubmitRequest) -> TaskId {
        match self.runtime.admit(req).unwrap() {
            AdmitOutcome::Admitted { task_id, event, .. } => {
                self.pump(event);
                task_id
            }
            AdmitOutcome::Rejected { reason, .. } => panic!("unexpected rejection: {reason}"),
        }
    }

    pub fn beat(&self, worker_id: &WorkerId) {
        let (_, event) = self
            .runtime
            .heartbeat(worker_id.as_str(), BeatStatus::Idle, Default::default())
            .unwrap();
        self.pump(event);
    }

    pub fn report_success(&self, worker_id: &WorkerId, task_id: &TaskId) {
        let event = self
            .runtime
            .report(worker_id.as_str(), task_id.as_str(), true, None)
            .unwrap();
        self.pump(event);
    }

    pub fn report_failure(&self, worker_id: &WorkerId, task_id: &TaskId, reason: &str) {
        let event = self
            .runtime
            .report(
                worker_id.as_str(),
                task_id.as_str(),
                false,
                Some(reason.to_string()),
            )
            .unwrap();
        self.pump(event);
    }

    /// Advance the fake clock and run both sweeps, pumping their events.
    pub fn tick(&self, advance: Duration) -> Vec<Event> {
        self.clock.advance(advance);
        let now_ms = self.clock.epoch_ms();
        let mut log = Vec::new();
        for event in self.runtime.sweep_heartbeats(now_ms) {
            log.extend(self.pump(event));
        }
        for event in self.runtime.sweep_ttl(now_ms) {
            log.extend(self.pump(event));
        }
        log
    }

    pub fn task_state(&self, task_id: &TaskId) -> TaskState {
        self.runtime
            .lock_state(|st| st.tasks[task_id.as_str()].state)
    }

    pub fn task_worker(&self, task_id: &TaskId) -> Option<WorkerId> {
        self.runtime
            .lock_state(|st| st.tasks[task_id.as_str()].worker_id.clone())
    }

    pub fn worker_state(&self, worker_id: &WorkerId) -> Option<WorkerState> {
        self.runtime
            .lock_state(|st| st.workers.get(worker_id.as_str()).map(|w| w.state))
    }

    pub fn check_invariants(&self) {
        self.runtime
            .lock_state(|st| st.check_invariants())
            .unwrap();
    }
}

fn names(log: &[Event]) -> Vec<&'static str> {
    log.iter().map(|e| e.name()).collect()
}
