// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::RuntimeError;

#[test]
fn success_report_completes_and_frees_capacity() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let t1 = lp.submit("fix the login bug");
    let t2 = lp.submit("fix the next bug");
    assert_eq!(lp.task_state(&t2), TaskState::Queued);

    lp.report_success(&worker, &t1);

    assert_eq!(lp.task_state(&t1), TaskState::Completed);
    // Freed capacity dispatches the queued task in the same pass
    assert_eq!(lp.task_state(&t2), TaskState::Assigned);
    lp.check_invariants();
}

#[test]
fn duplicate_completion_report_is_a_state_conflict() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    lp.report_success(&worker, &task);

    let err = lp
        .runtime
        .report(worker.as_str(), task.as_str(), true, None)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::StateConflict(_)));
    // No corruption: still completed, load still zero
    assert_eq!(lp.task_state(&task), TaskState::Completed);
    lp.check_invariants();
}

#[test]
fn report_from_non_owner_is_refused() {
    let lp = Loop::new();
    lp.register(&["development"], 1);
    let intruder = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    let owner = lp.task_worker(&task).unwrap();
    assert_ne!(owner, intruder);

    let err = lp
        .runtime
        .report(intruder.as_str(), task.as_str(), true, None)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TaskNotAssigned(_)));
}

#[test]
fn report_for_unknown_task_errors() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let err = lp
        .runtime
        .report(worker.as_str(), "task-ghost", true, None)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TaskNotFound(_)));
}

#[test]
fn failure_reports_exhaust_into_terminal_failure() {
    let mut config = CoordinatorConfig::default();
    config.default_max_retries = 1;
    let lp = Loop::with_config(config);
    let w1 = lp.register(&["development"], 1);
    let w2 = lp.register(&["development"], 1);

    let task = lp.submit("fix the login bug");
    let first = lp.task_worker(&task).unwrap();
    lp.report_failure(&first, &task, "segfault");

    // One retry allowed: requeued and picked up by the other worker
    let second = lp.task_worker(&task).unwrap();
    assert_ne!(first, second);
    assert!(second == w1 || second == w2);

    lp.report_failure(&second, &task, "segfault again");
    assert_eq!(lp.task_state(&task), TaskState::Failed);
    lp.runtime.lock_state(|st| {
        assert_eq!(
            st.tasks[task.as_str()].failure.as_deref(),
            Some("exhausted-retries")
        );
    });
    lp.check_invariants();
}

#[test]
fn cancel_queued_task_is_immediate() {
    let lp = Loop::new();
    let task = lp.submit("fix the login bug");

    let (pending, event) = lp.runtime.cancel(task.as_str()).unwrap();
    assert!(!pending);
    let log = lp.pump(event);
    assert!(names(&log).contains(&"task-cancelled"));
    assert_eq!(lp.task_state(&task), TaskState::Cancelled);
}

#[test]
fn cancel_running_task_waits_for_grace() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    assert_eq!(lp.task_worker(&task), Some(worker.clone()));

    let (pending, event) = lp.runtime.cancel(task.as_str()).unwrap();
    assert!(pending);
    let log = lp.pump(event);
    assert!(names(&log).contains(&"task-cancelling"));
    // Still held by the worker during the grace period
    assert_eq!(lp.task_state(&task), TaskState::Assigned);

    // Worker confirms by reporting failure while the cancel is pending
    lp.report_failure(&worker, &task, "cancelled");
    assert_eq!(lp.task_state(&task), TaskState::Cancelled);
    lp.check_invariants();
}

#[test]
fn cancel_terminal_task_is_a_conflict() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    lp.report_success(&worker, &task);

    let err = lp.runtime.cancel(task.as_str()).unwrap_err();
    assert!(matches!(err, RuntimeError::StateConflict(_)));
}
