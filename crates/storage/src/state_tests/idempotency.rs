// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Double-apply tests: events are applied eagerly by the engine and again
//! when they return from the WAL, so every handler must tolerate replays.

use super::*;

#[test]
fn double_register_is_idempotent() {
    let mut state = MaterializedState::default();
    let event = register_event("wkr-1", &["development"], 2);
    state.apply_event(&event);
    state.apply_event(&event);
    assert_eq!(state.workers.len(), 1);
}

#[test]
fn double_admit_is_idempotent() {
    let mut state = MaterializedState::default();
    let event = admit_event("task-1", "fix bug", Priority::P2, 1_000);
    state.apply_event(&event);
    state.apply_event(&event);
    assert_eq!(state.tasks.len(), 1);
    assert_eq!(state.queue.len(), 1);
}

#[test]
fn double_assign_does_not_double_increment_load() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 2));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    let event = assign_event("task-1", "wkr-1", 2_000);
    state.apply_event(&event);
    state.apply_event(&event);

    assert_eq!(state.workers["wkr-1"].load, 1);
    assert_eq!(state.category_stats["development"].dispatched, 1);
    state.check_invariants().unwrap();
}

#[test]
fn double_complete_does_not_double_decrement_load() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 2));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&admit_event("task-2", "other", Priority::P2, 1_100));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&assign_event("task-2", "wkr-1", 2_100));

    let event = complete_event("task-1", "wkr-1", 3_000);
    state.apply_event(&event);
    state.apply_event(&event);

    assert_eq!(state.workers["wkr-1"].load, 1);
    assert_eq!(state.category_stats["development"].completed, 1);
    state.check_invariants().unwrap();
}

#[test]
fn duplicate_heartbeats_are_idempotent() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    let event = heartbeat_event("wkr-1", 1_005_000);
    state.apply_event(&event);
    state.apply_event(&event);
    assert_eq!(state.workers["wkr-1"].heartbeats.len(), 1);
}

#[test]
fn double_reassign_keeps_single_queue_entry() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    let event = reassign_event("task-1", "wkr-1", 1, 3_000);
    state.apply_event(&event);
    state.apply_event(&event);

    assert_eq!(state.queue.len(), 1);
    assert_eq!(state.tasks["task-1"].retry_count, 1);
    assert_eq!(state.workers["wkr-1"].load, 0);
    state.check_invariants().unwrap();
}

#[test]
fn complete_after_reassign_is_stale_and_ignored() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&reassign_event("task-1", "wkr-1", 1, 3_000));

    // A late completion report from the old worker must not corrupt state
    state.apply_event(&complete_event("task-1", "wkr-1", 4_000));
    assert_eq!(state.tasks["task-1"].state, cortex_core::task::TaskState::Queued);
    state.check_invariants().unwrap();
}
