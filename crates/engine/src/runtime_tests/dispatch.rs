// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn dispatch_prefers_least_loaded_worker() {
    let lp = Loop::new();
    let w1 = lp.register(&["development"], 4);
    let w2 = lp.register(&["development"], 4);

    let t1 = lp.submit("fix the login bug");
    let t2 = lp.submit("fix the signup bug");

    // One each: second dispatch goes to the empty worker
    let owners = [lp.task_worker(&t1).unwrap(), lp.task_worker(&t2).unwrap()];
    assert!(owners.contains(&w1));
    assert!(owners.contains(&w2));
    lp.check_invariants();
}

#[test]
fn head_of_queue_blocks_until_capacity_frees() {
    let lp = Loop::new();
    let w1 = lp.register(&["development"], 1);
    lp.register(&["security"], 1);

    let t1 = lp.submit("fix the login bug");
    let t2 = lp.submit("fix the billing bug");
    // A security task behind the blocked development head
    let t3 = lp.submit_request(SubmitRequest {
        description: "audit the payment vulnerability".to_string(),
        declared_type: Some("security".to_string()),
        ..SubmitRequest::default()
    });

    assert_eq!(lp.task_state(&t1), TaskState::Assigned);
    // Head (t2) has no free development worker, and it blocks t3 despite
    // free security capacity: dispatch is strictly in queue order
    assert_eq!(lp.task_state(&t2), TaskState::Queued);
    assert_eq!(lp.task_state(&t3), TaskState::Queued);

    // Completing t1 frees capacity; t2 dispatches, then t3
    lp.report_success(&w1, &t1);
    assert_eq!(lp.task_state(&t2), TaskState::Assigned);
    assert_eq!(lp.task_state(&t3), TaskState::Assigned);
    lp.check_invariants();
}

#[test]
fn draining_worker_receives_no_assignments() {
    let lp = Loop::new();
    let w1 = lp.register(&["development"], 2);
    let t1 = lp.submit("fix the login bug");
    assert_eq!(lp.task_worker(&t1), Some(w1.clone()));

    let (_, event) = lp.runtime.unregister(w1.as_str()).unwrap();
    lp.pump(event);
    assert_eq!(lp.worker_state(&w1), Some(WorkerState::Draining));

    let t2 = lp.submit("fix the other bug");
    assert_eq!(lp.task_state(&t2), TaskState::Queued);
}

#[test]
fn retry_excludes_the_failed_worker() {
    let lp = Loop::new();
    let w1 = lp.register(&["development"], 1);
    let t1 = lp.submit("fix the login bug");
    assert_eq!(lp.task_worker(&t1), Some(w1.clone()));

    lp.report_failure(&w1, &t1, "segfault");

    // Requeued, and the only capable worker is excluded: stays queued
    assert_eq!(lp.task_state(&t1), TaskState::Queued);
    lp.runtime.lock_state(|st| {
        assert_eq!(st.tasks[t1.as_str()].retry_count, 1);
        assert_eq!(
            st.tasks[t1.as_str()].excluded_worker.as_ref(),
            Some(&w1)
        );
    });

    // A second worker picks it up
    let w2 = lp.register(&["development"], 1);
    assert_eq!(lp.task_worker(&t1), Some(w2));
    lp.check_invariants();
}
