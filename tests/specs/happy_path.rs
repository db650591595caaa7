// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy path: one worker, one task, completion.

use crate::prelude::*;
use cortex_core::task::TaskState;
use cortex_core::worker::WorkerState;
use std::collections::BTreeMap;

#[test]
fn single_worker_lifecycle() {
    let mut c = Coordinator::new();
    let events = c.hub.subscribe(Vec::new());

    let w1 = c.register(&["development"], 2);
    let t1 = c.submit("fix login bug");

    // Admitted, routed to development, assigned to W1
    let task = c.task(&t1);
    assert_eq!(task.category, "development");
    assert_eq!(task.state, TaskState::Assigned);
    assert_eq!(task.worker_id.as_ref(), Some(&w1));

    // W1 heartbeats with progress, then reports success
    let progress: BTreeMap<String, u8> = [(t1.as_str().to_string(), 50)].into_iter().collect();
    c.beat_with_progress(&w1, progress);
    assert_eq!(c.task(&t1).state, TaskState::InProgress);

    c.report_success(&w1, &t1);

    // Final state: task completed, worker idle with zero load
    let task = c.task(&t1);
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.worker_id, None);
    let state = c.state_clone();
    let worker = &state.workers[w1.as_str()];
    assert_eq!(worker.load, 0);
    assert_eq!(worker.state, WorkerState::Idle);
    state.check_invariants().unwrap();

    // Observers saw every public transition, in order
    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event.name());
    }
    let expected = [
        "worker-registered",
        "task-admitted",
        "task-assigned",
        "task-progress",
        "task-completed",
    ];
    let positions: Vec<_> = expected
        .iter()
        .map(|kind| seen.iter().position(|s| s == kind).unwrap_or(usize::MAX))
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "out of order: {seen:?}"
    );
}
