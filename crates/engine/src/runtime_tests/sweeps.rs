// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn heartbeat_boundary_is_not_yet_late_or_timed_out() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);

    // Exactly at the warning boundary: nothing
    let log = lp.tick(Duration::from_millis(10_000));
    assert!(names(&log).is_empty());

    // One past the warning boundary: late event, no state change
    let log = lp.tick(Duration::from_millis(1));
    assert_eq!(names(&log), vec!["worker-late"]);
    assert_eq!(lp.worker_state(&worker), Some(WorkerState::Idle));
}

#[test]
fn timeout_boundary_is_exclusive() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);

    // Exactly at the timeout boundary: still only late
    let log = lp.tick(Duration::from_millis(15_000));
    assert_eq!(names(&log), vec!["worker-late"]);

    // One tick past: timed out
    let log = lp.tick(Duration::from_millis(1));
    assert!(names(&log).contains(&"worker-timeout"));
    assert_eq!(lp.worker_state(&worker), Some(WorkerState::TimedOut));
}

#[test]
fn timeout_releases_tasks_to_surviving_worker() {
    let lp = Loop::new();
    let w1 = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    assert_eq!(lp.task_worker(&task), Some(w1.clone()));

    let w2 = lp.register(&["development"], 1);
    // Keep w2 alive while w1 goes silent
    lp.clock.advance(Duration::from_millis(14_000));
    lp.beat(&w2);

    let log = lp.tick(Duration::from_millis(1_001));
    let seen = names(&log);
    assert!(seen.contains(&"worker-timeout"));
    assert!(seen.contains(&"task-reassigned"));
    assert!(seen.contains(&"task-assigned"));

    assert_eq!(lp.worker_state(&w1), Some(WorkerState::TimedOut));
    assert_eq!(lp.task_worker(&task), Some(w2));
    lp.runtime
        .lock_state(|st| assert_eq!(st.tasks[task.as_str()].retry_count, 1));
    lp.check_invariants();
}

#[test]
fn heartbeats_prevent_timeout() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    for _ in 0..10 {
        lp.clock.advance(Duration::from_millis(5_000));
        lp.beat(&worker);
    }
    let log = lp.tick(Duration::from_millis(5_000));
    assert!(!names(&log).contains(&"worker-timeout"));
    assert_eq!(lp.worker_state(&worker), Some(WorkerState::Idle));
}

#[test]
fn ttl_expires_queued_and_running_tasks() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let running = lp.submit("fix the login bug");
    let queued = lp.submit("fix the other bug");
    assert_eq!(lp.task_state(&running), TaskState::Assigned);
    assert_eq!(lp.task_state(&queued), TaskState::Queued);

    // Keep the worker alive but let the default 300s TTL lapse
    for _ in 0..31 {
        lp.clock.advance(Duration::from_millis(10_000));
        lp.beat(&worker);
    }
    let log = lp.tick(Duration::from_millis(1));
    let expired = log.iter().filter(|e| e.name() == "task-expired").count();
    assert_eq!(expired, 2);

    assert_eq!(lp.task_state(&running), TaskState::Expired);
    assert_eq!(lp.task_state(&queued), TaskState::Expired);
    lp.runtime
        .lock_state(|st| assert_eq!(st.workers[worker.as_str()].load, 0));
    lp.check_invariants();
}

#[test]
fn unconfirmed_cancel_is_forced_after_grace() {
    let mut config = CoordinatorConfig::default();
    config.default_max_retries = 0;
    let lp = Loop::with_config(config);
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");

    let (_, event) = lp.runtime.cancel(task.as_str()).unwrap();
    lp.pump(event);

    // Keep the worker heartbeating but never confirming the cancel
    lp.clock.advance(Duration::from_millis(4_000));
    lp.beat(&worker);
    let log = lp.tick(Duration::from_millis(1_001));

    assert!(names(&log).contains(&"task-failed"));
    assert_eq!(lp.task_state(&task), TaskState::Failed);
    lp.runtime.lock_state(|st| {
        assert_eq!(
            st.tasks[task.as_str()].failure.as_deref(),
            Some("cancel-forced")
        );
    });
    lp.check_invariants();
}

#[test]
fn forced_cancel_requeues_when_retries_remain() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");

    let (_, event) = lp.runtime.cancel(task.as_str()).unwrap();
    lp.pump(event);

    lp.clock.advance(Duration::from_millis(4_000));
    lp.beat(&worker);
    let log = lp.tick(Duration::from_millis(1_001));

    assert!(names(&log).contains(&"task-reassigned"));
    lp.runtime
        .lock_state(|st| assert_eq!(st.tasks[task.as_str()].retry_count, 1));
    lp.check_invariants();
}

#[test]
fn terminal_tasks_are_pruned_after_retention() {
    let mut config = CoordinatorConfig::default();
    config.task_retention_ms = 60_000;
    let lp = Loop::with_config(config);
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");
    lp.report_success(&worker, &task);

    // Keep the worker alive past the retention window
    for _ in 0..7 {
        lp.clock.advance(Duration::from_millis(10_000));
        lp.beat(&worker);
    }
    let log = lp.tick(Duration::from_millis(1));
    assert!(names(&log).contains(&"task-pruned"));
    lp.runtime
        .lock_state(|st| assert!(!st.tasks.contains_key(task.as_str())));
}

#[test]
fn drain_deadline_forces_release() {
    let lp = Loop::new();
    let worker = lp.register(&["development"], 1);
    let task = lp.submit("fix the login bug");

    let (_, event) = lp.runtime.unregister(worker.as_str()).unwrap();
    lp.pump(event);
    assert_eq!(lp.worker_state(&worker), Some(WorkerState::Draining));

    // Past the drain deadline the task is released and the worker removed
    lp.clock.advance(Duration::from_millis(4_000));
    lp.beat(&worker);
    let log = lp.tick(Duration::from_millis(1_001));
    let seen = names(&log);
    assert!(seen.contains(&"worker-timeout"));
    assert!(seen.contains(&"task-reassigned"));
    assert_eq!(lp.task_state(&task), TaskState::Queued);
    lp.check_invariants();
}
