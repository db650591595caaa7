// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::worker::WorkerState;

#[test]
fn register_creates_idle_worker() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development", "ci-cd"], 4));

    let worker = &state.workers["wkr-1"];
    assert_eq!(worker.state, WorkerState::Idle);
    assert_eq!(worker.load, 0);
    assert_eq!(worker.max_concurrent, 4);
    assert!(worker.capabilities.contains("development"));
    assert!(worker.capabilities.contains("ci-cd"));
}

#[test]
fn heartbeat_updates_last_seen() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&heartbeat_event("wkr-1", 1_005_000));

    assert_eq!(state.workers["wkr-1"].last_heartbeat_ms, 1_005_000);
    assert_eq!(state.workers["wkr-1"].heartbeats.len(), 1);
}

#[test]
fn heartbeat_for_unknown_worker_is_noop() {
    let mut state = MaterializedState::default();
    state.apply_event(&heartbeat_event("ghost", 1_000));
    assert!(state.workers.is_empty());
}

#[test]
fn timeout_marks_worker_and_ignores_later_heartbeats() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&Event::WorkerTimeout {
        worker_id: WorkerId::new("wkr-1"),
        at_ms: 1_020_000,
    });
    assert_eq!(state.workers["wkr-1"].state, WorkerState::TimedOut);

    // A timed-out worker that resumes heartbeating is not revived
    state.apply_event(&heartbeat_event("wkr-1", 1_021_000));
    assert_eq!(state.workers["wkr-1"].state, WorkerState::TimedOut);
    assert_eq!(state.workers["wkr-1"].last_heartbeat_ms, 1_000_000);
}

#[test]
fn draining_then_unregistered() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&Event::WorkerDraining {
        worker_id: WorkerId::new("wkr-1"),
        deadline_ms: 1_030_000,
    });
    assert_eq!(state.workers["wkr-1"].state, WorkerState::Draining);
    assert_eq!(state.workers["wkr-1"].drain_deadline_ms, Some(1_030_000));

    state.apply_event(&Event::WorkerUnregistered {
        worker_id: WorkerId::new("wkr-1"),
    });
    assert!(!state.workers.contains_key("wkr-1"));
}

#[test]
fn draining_worker_still_heartbeats() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&Event::WorkerDraining {
        worker_id: WorkerId::new("wkr-1"),
        deadline_ms: 1_030_000,
    });
    state.apply_event(&heartbeat_event("wkr-1", 1_006_000));
    assert_eq!(state.workers["wkr-1"].last_heartbeat_ms, 1_006_000);
}

#[test]
fn unregister_nonexistent_is_noop() {
    let mut state = MaterializedState::default();
    state.apply_event(&Event::WorkerUnregistered {
        worker_id: WorkerId::new("ghost"),
    });
    assert!(state.workers.is_empty());
}
