// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::RuntimeError;

#[test]
fn register_clamps_concurrency_to_ceiling() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 99);
    lp.runtime.lock_state(|st| {
        assert_eq!(st.workers[worker.as_str()].max_concurrent, 10);
    });
}

#[test]
fn heartbeat_ack_carries_assignments() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 2);
    let task = lp.submit("fix the login bug");

    let (ack, event) = lp
        .runtime
        .heartbeat(worker.as_str(), BeatStatus::Busy, Default::default())
        .unwrap();
    lp.pump(event);

    assert_eq!(ack.state, WorkerState::Busy);
    assert_eq!(ack.assignments, vec![task]);
}

#[test]
fn heartbeat_unknown_worker_errors() {
    let lp = Loop::new();
    let err = lp
        .runtime
        .heartbeat("wkr-ghost", BeatStatus::Idle, Default::default())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::WorkerNotFound(_)));
}

#[test]
fn timed_out_worker_must_reregister() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    // Silence past the timeout threshold
    let log = lp.tick(Duration::from_millis(15_001));
    assert!(names(&log).contains(&"worker-timeout"));

    let err = lp
        .runtime
        .heartbeat(worker.as_str(), BeatStatus::Idle, Default::default())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::WorkerExpired(_)));
}

#[test]
fn progress_report_moves_task_in_progress() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    assert_eq!(lp.task_state(&task), TaskState::Assigned);

    let progress = [(task.as_str().to_string(), 30u8)].into_iter().collect();
    let (_, event) = lp
        .runtime
        .heartbeat(worker.as_str(), BeatStatus::Busy, progress)
        .unwrap();
    let log = lp.pump(event);

    assert!(names(&log).contains(&"task-progress"));
    assert_eq!(lp.task_state(&task), TaskState::InProgress);
}

#[test]
fn progress_for_unowned_task_is_dropped() {
    let lp = Loop::new();
    let w1 = lp.register(&["development"], 1);
    let w2 = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    let owner = lp.task_worker(&task).unwrap();
    let other = if owner == w1 { w2 } else { w1 };

    let progress = [(task.as_str().to_string(), 30u8)].into_iter().collect();
    let (_, event) = lp
        .runtime
        .heartbeat(other.as_str(), BeatStatus::Busy, progress)
        .unwrap();
    let log = lp.pump(event);

    assert!(!names(&log).contains(&"task-progress"));
    assert_eq!(lp.task_state(&task), TaskState::Assigned);
}

#[test]
fn unregister_idle_worker_is_immediate() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let (outstanding, event) = lp.runtime.unregister(worker.as_str()).unwrap();
    assert!(outstanding.is_empty());
    lp.pump(event);
    assert_eq!(lp.worker_state(&worker), None);
}

#[test]
fn unregister_busy_worker_drains_then_leaves() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 2);
    let task = lp.submit("fix the login bug");

    let (outstanding, event) = lp.runtime.unregister(worker.as_str()).unwrap();
    assert_eq!(outstanding, vec![task.clone()]);
    lp.pump(event);
    assert_eq!(lp.worker_state(&worker), Some(WorkerState::Draining));

    // The in-flight task completes, which finishes the drain
    lp.report_success(&worker, &task);
    assert_eq!(lp.task_state(&task), TaskState::Completed);
    assert_eq!(lp.worker_state(&worker), None);
    lp.check_invariants();
}

#[test]
fn unregister_unknown_worker_errors() {
    let lp = Loop::new();
    let err = lp.runtime.unregister("wkr-ghost").unwrap_err();
    assert!(matches!(err, RuntimeError::WorkerNotFound(_)));
}

#[test]
fn double_unregister_is_a_conflict() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 2);
    lp.submit("fix the login bug");
    let (_, event) = lp.runtime.unregister(worker.as_str()).unwrap();
    lp.pump(event);

    let err = lp.runtime.unregister(worker.as_str()).unwrap_err();
    assert!(matches!(err, RuntimeError::StateConflict(_)));
}
