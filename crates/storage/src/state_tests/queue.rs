// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn queued_ids(state: &MaterializedState) -> Vec<&str> {
    state.queue.iter().map(|id| id.as_str()).collect()
}

#[test]
fn queue_orders_by_priority_then_submission() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-a", "a", Priority::P2, 1_000));
    state.apply_event(&admit_event("task-b", "b", Priority::P0, 2_000));
    state.apply_event(&admit_event("task-c", "c", Priority::P2, 3_000));
    state.apply_event(&admit_event("task-d", "d", Priority::P1, 4_000));

    assert_eq!(queued_ids(&state), vec!["task-b", "task-d", "task-a", "task-c"]);
    state.check_invariants().unwrap();
}

#[test]
fn same_priority_keeps_admission_order() {
    let mut state = MaterializedState::default();
    for i in 0..5 {
        state.apply_event(&admit_event(
            &format!("task-{i}"),
            "work",
            Priority::P1,
            1_000 + i,
        ));
    }
    assert_eq!(
        queued_ids(&state),
        vec!["task-0", "task-1", "task-2", "task-3", "task-4"]
    );
}

#[test]
fn p0_preempts_queued_but_not_running() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-low", "low", Priority::P3, 1_000));
    state.apply_event(&assign_event("task-low", "wkr-1", 2_000));

    state.apply_event(&admit_event("task-urgent", "urgent", Priority::P0, 3_000));

    // The running task keeps its worker; the P0 only jumps the queue
    assert_eq!(
        state.tasks["task-low"].worker_id,
        Some(WorkerId::new("wkr-1"))
    );
    assert_eq!(queued_ids(&state), vec!["task-urgent"]);
}

#[yare::parameterized(
    p0_jumps_ahead   = { Priority::P0, 0 },
    p1_joins_its_band = { Priority::P1, 1 },
    p3_goes_last     = { Priority::P3, 2 },
)]
fn new_task_inserts_at_priority_position(priority: Priority, expected_index: usize) {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-p1", "one", Priority::P1, 1_000));
    state.apply_event(&admit_event("task-p2", "two", Priority::P2, 2_000));

    state.apply_event(&admit_event("task-new", "new", priority, 3_000));
    let position = state
        .queue
        .iter()
        .position(|id| id == &TaskId::new("task-new"))
        .unwrap();
    assert_eq!(position, expected_index);
    state.check_invariants().unwrap();
}

#[test]
fn reassigned_task_rejoins_at_its_priority() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "first", Priority::P1, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 1_500));
    state.apply_event(&admit_event("task-2", "later p1", Priority::P1, 2_000));
    state.apply_event(&admit_event("task-3", "p2", Priority::P2, 2_500));

    state.apply_event(&reassign_event("task-1", "wkr-1", 1, 3_000));

    // Priority intact: rejoins ahead of the later P1 by submission time
    assert_eq!(queued_ids(&state), vec!["task-1", "task-2", "task-3"]);
    state.check_invariants().unwrap();
}
