// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue priority ordering under constrained capacity.

use crate::prelude::*;
use cortex_core::task::TaskState;
use cortex_core::{Event, Priority};
use std::time::Duration;

#[test]
fn p0_dispatches_first_within_submission_order() {
    let mut c = Coordinator::new();
    let events = c.hub.subscribe(vec!["task-assigned".to_string()]);

    // One worker at max capacity holding a running task
    let w1 = c.register(&["development"], 1);
    let blocker = c.submit("fix bug zero");
    assert_eq!(c.task(&blocker).state, TaskState::Assigned);

    // Submit P2, P0, P2, P1 while the worker is full
    c.clock.advance(Duration::from_millis(10));
    let p2_first = c.submit_with("fix bug one", Some(Priority::P2));
    c.clock.advance(Duration::from_millis(10));
    let p0 = c.submit_with("fix bug two", Some(Priority::P0));
    c.clock.advance(Duration::from_millis(10));
    let p2_second = c.submit_with("fix bug three", Some(Priority::P2));
    c.clock.advance(Duration::from_millis(10));
    let p1 = c.submit_with("fix bug four", Some(Priority::P1));

    // Drain the initial assignment of the blocker
    while events.try_recv().is_some() {}

    // Release capacity one task at a time
    let mut order = Vec::new();
    let mut current = blocker;
    for _ in 0..4 {
        c.report_success(&w1, &current);
        match events.try_recv() {
            Some(Event::TaskAssigned { task_id, .. }) => {
                current = task_id.clone();
                order.push(task_id);
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
        assert!(events.try_recv().is_none(), "one dispatch per release");
    }
    c.report_success(&w1, &current);

    assert_eq!(order, vec![p0, p1, p2_first, p2_second]);
    c.state_clone().check_invariants().unwrap();
}
