// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::task::TaskState;

#[test]
fn admitted_task_enters_queue() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));

    assert_eq!(state.tasks["task-1"].state, TaskState::Queued);
    assert_eq!(state.queue, vec![TaskId::new("task-1")]);
}

#[test]
fn assignment_moves_task_out_of_queue() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));

    let task = &state.tasks["task-1"];
    assert_eq!(task.state, TaskState::Assigned);
    assert_eq!(task.worker_id, Some(WorkerId::new("wkr-1")));
    assert!(state.queue.is_empty());
    assert_eq!(state.workers["wkr-1"].load, 1);
    assert_eq!(state.workers["wkr-1"].last_assigned_at_ms, 2_000);
}

#[test]
fn assignment_to_unknown_worker_is_rejected() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "ghost", 2_000));

    // Task stays queued; no dangling worker reference
    assert_eq!(state.tasks["task-1"].state, TaskState::Queued);
    assert_eq!(state.queue.len(), 1);
    state.check_invariants().unwrap();
}

#[test]
fn progress_moves_assigned_to_in_progress() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&Event::TaskProgress {
        task_id: TaskId::new("task-1"),
        worker_id: WorkerId::new("wkr-1"),
        percent: 40,
        at_ms: 3_000,
    });

    assert_eq!(state.tasks["task-1"].state, TaskState::InProgress);
}

#[test]
fn progress_from_non_owner_is_ignored() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&register_event("wkr-2", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&Event::TaskProgress {
        task_id: TaskId::new("task-1"),
        worker_id: WorkerId::new("wkr-2"),
        percent: 40,
        at_ms: 3_000,
    });

    assert_eq!(state.tasks["task-1"].state, TaskState::Assigned);
}

#[test]
fn failure_releases_worker_and_records_reason() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&Event::TaskFailed {
        task_id: TaskId::new("task-1"),
        reason: "exhausted-retries".to_string(),
        worker_id: Some(WorkerId::new("wkr-1")),
        at_ms: 3_000,
    });

    let task = &state.tasks["task-1"];
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.failure.as_deref(), Some("exhausted-retries"));
    assert_eq!(task.worker_id, None);
    assert_eq!(state.workers["wkr-1"].load, 0);
    state.check_invariants().unwrap();
}

#[test]
fn reassignment_requeues_with_exclusion() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&reassign_event("task-1", "wkr-1", 1, 3_000));

    let task = &state.tasks["task-1"];
    assert_eq!(task.state, TaskState::Queued);
    assert_eq!(task.retry_count, 1);
    assert_eq!(task.excluded_worker, Some(WorkerId::new("wkr-1")));
    assert_eq!(task.worker_id, None);
    assert_eq!(state.workers["wkr-1"].load, 0);
    assert_eq!(state.queue.len(), 1);
    state.check_invariants().unwrap();
}

#[test]
fn expiry_removes_from_queue_and_releases_worker() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-1", "queued", Priority::P2, 1_000));
    state.apply_event(&Event::TaskExpired {
        task_id: TaskId::new("task-1"),
        at_ms: 400_000,
    });
    assert_eq!(state.tasks["task-1"].state, TaskState::Expired);
    assert!(state.queue.is_empty());

    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-2", "running", Priority::P2, 2_000));
    state.apply_event(&assign_event("task-2", "wkr-1", 3_000));
    state.apply_event(&Event::TaskExpired {
        task_id: TaskId::new("task-2"),
        at_ms: 400_000,
    });
    assert_eq!(state.tasks["task-2"].state, TaskState::Expired);
    assert_eq!(state.workers["wkr-1"].load, 0);
    state.check_invariants().unwrap();
}

#[test]
fn cancel_queued_task() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-1", "queued", Priority::P2, 1_000));
    state.apply_event(&Event::TaskCancelled {
        task_id: TaskId::new("task-1"),
        at_ms: 2_000,
    });
    assert_eq!(state.tasks["task-1"].state, TaskState::Cancelled);
    assert!(state.queue.is_empty());
}

#[test]
fn cancelling_sets_grace_deadline() {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 1));
    state.apply_event(&admit_event("task-1", "running", Priority::P2, 1_000));
    state.apply_event(&assign_event("task-1", "wkr-1", 2_000));
    state.apply_event(&Event::TaskCancelling {
        task_id: TaskId::new("task-1"),
        deadline_ms: 7_000,
    });
    assert_eq!(state.tasks["task-1"].cancel_deadline_ms, Some(7_000));
    // Still assigned until the worker confirms or the deadline passes
    assert_eq!(state.tasks["task-1"].state, TaskState::Assigned);
}

#[test]
fn prune_removes_only_terminal_tasks() {
    let mut state = MaterializedState::default();
    state.apply_event(&admit_event("task-1", "queued", Priority::P2, 1_000));
    state.apply_event(&Event::TaskPruned {
        task_id: TaskId::new("task-1"),
    });
    // Non-terminal task survives pruning
    assert!(state.tasks.contains_key("task-1"));

    state.apply_event(&Event::TaskCancelled {
        task_id: TaskId::new("task-1"),
        at_ms: 2_000,
    });
    state.apply_event(&Event::TaskPruned {
        task_id: TaskId::new("task-1"),
    });
    assert!(!state.tasks.contains_key("task-1"));
}
