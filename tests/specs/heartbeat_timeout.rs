// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat timeout and reassignment across two workers.

use crate::prelude::*;
use cortex_core::task::TaskState;
use cortex_core::worker::WorkerState;
use std::time::Duration;

#[test]
fn dead_worker_hands_its_task_to_the_survivor() {
    let mut c = Coordinator::new();
    let events = c.hub.subscribe(Vec::new());

    let w1 = c.register(&["development"], 1);
    let w2 = c.register(&["development"], 1);
    let t1 = c.submit("fix login bug");

    // Tiebreak at equal load sends the task to the first-registered worker
    assert_eq!(c.task(&t1).worker_id.as_ref(), Some(&w1));

    // W2 keeps heartbeating; W1 goes silent past the timeout
    for _ in 0..3 {
        c.tick(Duration::from_millis(5_000));
        c.beat(&w2);
    }
    c.tick(Duration::from_millis(1));

    let state = c.state_clone();
    assert_eq!(state.workers[w1.as_str()].state, WorkerState::TimedOut);

    // T1 moved to W2 with its retry counter bumped
    let task = c.task(&t1);
    assert_eq!(task.worker_id.as_ref(), Some(&w2));
    assert_eq!(task.retry_count, 1);
    assert_eq!(task.state, TaskState::Assigned);
    state.check_invariants().unwrap();

    // Observers saw the timeout and the reassignment
    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event.name());
    }
    assert!(seen.contains(&"worker-timeout"));
    assert!(seen.contains(&"task-reassigned"));
}

#[test]
fn boundary_heartbeat_is_not_timed_out() {
    let mut c = Coordinator::new();
    let w1 = c.register(&["development"], 1);

    // Exactly at the timeout threshold: still registered
    c.tick(Duration::from_millis(15_000));
    let state = c.state_clone();
    assert_eq!(state.workers[w1.as_str()].state, WorkerState::Idle);

    // One tick later: timed out
    c.tick(Duration::from_millis(1));
    let state = c.state_clone();
    assert_eq!(state.workers[w1.as_str()].state, WorkerState::TimedOut);
}
