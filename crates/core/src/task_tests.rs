// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn task(state: TaskState) -> Task {
    Task {
        id: TaskId::new("task-1"),
        description: "fix login bug".to_string(),
        declared_type: None,
        priority: Priority::P2,
        state,
        scores: BTreeMap::new(),
        category: "development".to_string(),
        worker_id: None,
        excluded_worker: None,
        retry_count: 0,
        max_retries: 3,
        ttl_ms: 300_000,
        submitted_at_ms: 1_000_000,
        updated_at_ms: 1_000_000,
        finished_at_ms: None,
        flagged: false,
        failure: None,
        cancel_deadline_ms: None,
    }
}

#[test]
fn priority_orders_p0_first() {
    assert!(Priority::P0 < Priority::P1);
    assert!(Priority::P1 < Priority::P2);
    assert!(Priority::P2 < Priority::P3);
}

#[test]
fn priority_serde_uses_wire_names() {
    assert_eq!(serde_json::to_string(&Priority::P0).unwrap(), "\"P0\"");
    let p: Priority = serde_json::from_str("\"P3\"").unwrap();
    assert_eq!(p, Priority::P3);
}

#[yare::parameterized(
    completed = { TaskState::Completed, true },
    failed    = { TaskState::Failed, true },
    expired   = { TaskState::Expired, true },
    cancelled = { TaskState::Cancelled, true },
    queued    = { TaskState::Queued, false },
    assigned  = { TaskState::Assigned, false },
    running   = { TaskState::InProgress, false },
)]
fn terminal_states(state: TaskState, expected: bool) {
    assert_eq!(task(state).is_terminal(), expected);
}

#[test]
fn ttl_boundary_is_not_yet_expired() {
    let t = task(TaskState::Queued);
    // Exactly at the boundary: not expired
    assert!(!t.expired(1_000_000 + 300_000));
    // One past the boundary: expired
    assert!(t.expired(1_000_000 + 300_001));
}

#[test]
fn task_serde_roundtrip() {
    let mut t = task(TaskState::Assigned);
    t.worker_id = Some(WorkerId::new("wkr-1"));
    t.scores.insert("development".to_string(), 0.5);
    let json = serde_json::to_string(&t).unwrap();
    let back: Task = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);
}
