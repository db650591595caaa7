// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a coordinator wired like the daemon, driven
//! synchronously.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cortex_core::{
    BeatStatus, Clock, CoordinatorConfig, FakeClock, Priority, SequentialIdGen, Task, TaskId,
    WorkerId,
};
use cortex_daemon::event_bus::{EventBus, EventReader};
use cortex_daemon::hub::SubscriberHub;
use cortex_engine::{AdmitOutcome, Runtime, SubmitRequest};
use cortex_storage::{MaterializedState, Wal};
use parking_lot::Mutex;

pub type SpecRuntime = Runtime<FakeClock, SequentialIdGen>;

/// The daemon's moving parts, minus the socket: WAL-backed bus, runtime,
/// push-channel hub, and an engine loop driven by `drain()`.
pub struct Coordinator {
    pub runtime: SpecRuntime,
    pub clock: FakeClock,
    pub bus: EventBus,
    pub reader: EventReader,
    pub hub: Arc<SubscriberHub>,
}

impl Coordinator {
    /// Coordinator in write-ahead-log mode with the WAL at
    /// `<dir>/events.wal`.
    pub fn new_wal(dir: &Path) -> Self {
        let wal = Wal::open(&dir.join("events.wal"), 0).unwrap();
        let (bus, reader) = EventBus::new(wal);
        Self::with_bus(bus, reader, CoordinatorConfig::default())
    }

    /// Coordinator on an in-memory bus.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let (bus, reader) = EventBus::in_memory();
        Self::with_bus(bus, reader, config)
    }

    fn with_bus(bus: EventBus, reader: EventReader, config: CoordinatorConfig) -> Self {
        let clock = FakeClock::new();
        let state = Arc::new(Mutex::new(MaterializedState::default()));
        let hub = Arc::new(SubscriberHub::new(config.subscriber_buffer_depth));
        let runtime =
            Runtime::with_id_gen(state, config, clock.clone(), SequentialIdGen::new("s"));
        Self {
            runtime,
            clock,
            bus,
            reader,
            hub,
        }
    }

    /// Run the engine loop until the bus is drained: apply each event,
    /// handle it, persist result events, publish to the hub.
    pub fn drain(&mut self) {
        loop {
            let entries = self.reader.try_drain().unwrap();
            if entries.is_empty() {
                return;
            }
            for entry in entries {
                {
                    let state = self.runtime.state();
                    let mut state = state.lock();
                    state.apply_event(&entry.event);
                }
                for result in self.runtime.handle_event(&entry.event).unwrap() {
                    self.bus.send(result).unwrap();
                }
                self.hub.publish(&entry.event);
                self.reader.mark_processed(entry.seq);
            }
        }
    }

    pub fn register(&mut self, capabilities: &[&str], max_concurrent: u32) -> WorkerId {
        let caps = capabilities.iter().map(|s| s.to_string()).collect();
        let (worker_id, event) = self.runtime.register(caps, max_concurrent).unwrap();
        self.bus.send(event).unwrap();
        self.drain();
        worker_id
    }

    pub fn submit(&mut self, description: &str) -> TaskId {
        self.submit_with(description, None)
    }

    pub fn submit_with(&mut self, description: &str, priority: Option<Priority>) -> TaskId {
        let outcome = self
            .runtime
            .admit(SubmitRequest {
                description: description.to_string(),
                priority,
                ..SubmitRequest::default()
            })
            .unwrap();
        match outcome {
            AdmitOutcome::Admitted { task_id, event, .. } => {
                self.bus.send(event).unwrap();
                self.drain();
                task_id
            }
            AdmitOutcome::Rejected { reason, .. } => panic!("unexpected rejection: {reason}"),
        }
    }

    pub fn beat(&mut self, worker_id: &WorkerId) {
        self.beat_with_progress(worker_id, BTreeMap::new());
    }

    pub fn beat_with_progress(&mut self, worker_id: &WorkerId, progress: BTreeMap<String, u8>) {
        let (_, event) = self
            .runtime
            .heartbeat(worker_id.as_str(), BeatStatus::Busy, progress)
            .unwrap();
        self.bus.send(event).unwrap();
        self.drain();
    }

    pub fn report_success(&mut self, worker_id: &WorkerId, task_id: &TaskId) {
        let event = self
            .runtime
            .report(worker_id.as_str(), task_id.as_str(), true, None)
            .unwrap();
        self.bus.send(event).unwrap();
        self.drain();
    }

    /// Advance the clock and run the sweeps, draining everything they
    /// cause.
    pub fn tick(&mut self, advance: Duration) {
        self.clock.advance(advance);
        let now_ms = self.clock.epoch_ms();
        for event in self.runtime.sweep_heartbeats(now_ms) {
            self.bus.send(event).unwrap();
        }
        self.drain();
        for event in self.runtime.sweep_ttl(now_ms) {
            self.bus.send(event).unwrap();
        }
        self.drain();
    }

    pub fn task(&self, task_id: &TaskId) -> Task {
        let state = self.runtime.state();
        let state = state.lock();
        state.tasks[task_id.as_str()].clone()
    }

    pub fn state_clone(&self) -> MaterializedState {
        let state = self.runtime.state();
        let state = state.lock();
        state.clone()
    }
}

/// Replay a WAL into a fresh state, the way startup recovery does.
pub fn recover_state(dir: &Path) -> MaterializedState {
    let wal = Wal::open(&dir.join("events.wal"), 0).unwrap();
    let mut state = MaterializedState::default();
    for entry in wal.entries_after(0).unwrap() {
        state.apply_event(&entry.event);
    }
    state
}
