// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out isolation: a blocked subscriber loses events behind a
//! marker; a fast subscriber is unaffected.

use cortex_core::test_support::admit_event;
use cortex_core::{Event, Priority};
use cortex_daemon::hub::SubscriberHub;
use std::sync::Arc;

const TOTAL: usize = 10_000;
const DEPTH: usize = 256;

#[test]
fn fast_subscriber_unaffected_by_blocked_peer() {
    let hub = Arc::new(SubscriberHub::new(DEPTH));
    let fast = hub.subscribe(Vec::new());
    let slow = hub.subscribe(Vec::new());

    // The slow subscriber reads a prefix, then stops consuming
    let prefix = 100;
    let mut slow_seen: Vec<String> = Vec::new();

    for i in 0..TOTAL {
        hub.publish(&admit_event(
            &format!("task-{i:05}"),
            "work",
            Priority::P2,
            i as u64,
        ));
        if i < prefix {
            match slow.try_recv().unwrap() {
                Event::TaskAdmitted { task_id, .. } => slow_seen.push(task_id.to_string()),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    // The fast subscriber receives every event, in order
    let mut fast_count = 0;
    let mut last = String::new();
    while let Some(event) = fast.try_recv() {
        match event {
            Event::TaskAdmitted { task_id, .. } => {
                assert!(task_id.as_str() > last.as_str(), "out of order delivery");
                last = task_id.to_string();
                fast_count += 1;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(fast_count, TOTAL);

    // The slow subscriber sees its prefix, one lost-events marker, then
    // the most recent events
    match slow.try_recv().unwrap() {
        Event::LostEvents { dropped } => {
            assert_eq!(dropped as usize, TOTAL - prefix - DEPTH);
        }
        other => panic!("expected lost-events, got {other:?}"),
    }
    let mut tail = Vec::new();
    while let Some(event) = slow.try_recv() {
        match event {
            Event::TaskAdmitted { task_id, .. } => tail.push(task_id.to_string()),
            Event::LostEvents { .. } => panic!("only one marker expected"),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(tail.len(), DEPTH);
    assert_eq!(tail.last().unwrap(), &format!("task-{:05}", TOTAL - 1));
    assert_eq!(slow_seen.len(), prefix);
    assert_eq!(hub.dropped_total() as usize, TOTAL - prefix - DEPTH);
}
