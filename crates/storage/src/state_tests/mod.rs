// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod idempotency;
mod queue;
mod tasks;
mod workers;

use super::*;
pub(super) use cortex_core::test_support::{
    admit_event, assign_event, complete_event, heartbeat_event, reassign_event, register_event,
};
use cortex_core::{Event, Priority, TaskId, WorkerId};

// ── Invariant checking across a full task lifecycle ─────────────────────────

#[test]
fn invariants_hold_through_lifecycle() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 2));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P1, 1_000));
    state.check_invariants().unwrap();

    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.check_invariants().unwrap();
    assert_eq!(state.workers["wkr-1"].load, 1);

    state.apply_event(&complete_event("task-1", "wkr-1", 3_000));
    state.check_invariants().unwrap();
    assert_eq!(state.workers["wkr-1"].load, 0);
}

#[test]
fn prefix_lookup_resolves_unique_matches() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-abc123", "one", Priority::P2, 1_000));
    state.apply_event(&admit_event("task-abd456", "two", Priority::P2, 2_000));

    assert!(state.get_task("task-abc").is_some());
    // Ambiguous prefix resolves to nothing
    assert!(state.get_task("task-ab").is_none());
    assert!(state.get_task("missing").is_none());
}

#[test]
fn category_stats_track_outcomes() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 2));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&complete_event("task-1", "wkr-1", 3_000));

    let stats = &state.category_stats["development"];
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.success_rate(), 1.0);
}
