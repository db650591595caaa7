// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::test_support::{admit_event, assign_event, heartbeat_event};
use cortex_core::Priority;

fn hub(depth: usize) -> Arc<SubscriberHub> {
    Arc::new(SubscriberHub::new(depth))
}

#[test]
fn subscriber_receives_events_in_order() {
    let hub = hub(16);
    let sub = hub.subscribe(Vec::new());

    hub.publish(&admit_event("task-1", "one", Priority::P2, 1));
    hub.publish(&assign_event("task-1", "wkr-1", 2));

    assert_eq!(sub.try_recv().unwrap().name(), "task-admitted");
    assert_eq!(sub.try_recv().unwrap().name(), "task-assigned");
    assert!(sub.try_recv().is_none());
}

#[test]
fn kind_filter_limits_delivery() {
    let hub = hub(16);
    let sub = hub.subscribe(vec!["task-assigned".to_string()]);

    hub.publish(&admit_event("task-1", "one", Priority::P2, 1));
    hub.publish(&assign_event("task-1", "wkr-1", 2));

    assert_eq!(sub.try_recv().unwrap().name(), "task-assigned");
    assert!(sub.try_recv().is_none());
}

#[test]
fn internal_events_are_not_published() {
    let hub = hub(16);
    let sub = hub.subscribe(Vec::new());
    hub.publish(&heartbeat_event("wkr-1", 1_000));
    assert!(sub.try_recv().is_none());
}

#[test]
fn subscriber_only_sees_events_after_registration() {
    let hub = hub(16);
    hub.publish(&admit_event("task-1", "early", Priority::P2, 1));
    let sub = hub.subscribe(Vec::new());
    hub.publish(&admit_event("task-2", "late", Priority::P2, 2));

    match sub.try_recv().unwrap() {
        Event::TaskAdmitted { task_id, .. } => assert_eq!(task_id, "task-2"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn overflow_drops_oldest_and_inserts_one_marker() {
    let hub = hub(4);
    let sub = hub.subscribe(Vec::new());

    for i in 0..10 {
        hub.publish(&admit_event(&format!("task-{i}"), "work", Priority::P2, i));
    }

    // Six events were dropped; the marker arrives first with the count
    match sub.try_recv().unwrap() {
        Event::LostEvents { dropped } => assert_eq!(dropped, 6),
        other => panic!("expected lost-events, got {other:?}"),
    }
    // Then the latest events, in order
    for i in 6..10 {
        match sub.try_recv().unwrap() {
            Event::TaskAdmitted { task_id, .. } => {
                assert_eq!(task_id, format!("task-{i}").as_str())
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(sub.try_recv().is_none());
    assert_eq!(hub.dropped_total(), 6);
}

#[test]
fn slow_subscriber_does_not_affect_fast_one() {
    let hub = hub(4);
    let fast = hub.subscribe(Vec::new());
    let slow = hub.subscribe(Vec::new());

    // The fast subscriber drains while the slow one never reads
    for i in 0..100 {
        hub.publish(&admit_event(&format!("task-{i}"), "work", Priority::P2, i));
        match fast.try_recv().unwrap() {
            Event::TaskAdmitted { task_id, .. } => {
                assert_eq!(task_id, format!("task-{i}").as_str())
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    // The slow subscriber gets a marker plus the most recent events
    match slow.try_recv().unwrap() {
        Event::LostEvents { dropped } => assert_eq!(dropped, 96),
        other => panic!("expected lost-events, got {other:?}"),
    }
    let mut received = 0;
    while slow.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 4);
}

#[test]
fn drop_unsubscribes() {
    let hub = hub(4);
    let sub = hub.subscribe(Vec::new());
    assert_eq!(hub.subscriber_count(), 1);
    drop(sub);
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn recv_wakes_on_publish() {
    let hub = hub(4);
    let sub = hub.subscribe(Vec::new());

    let publisher = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            hub.publish(&admit_event("task-1", "work", Priority::P2, 1));
        })
    };

    let event = sub.recv().await;
    assert_eq!(event.name(), "task-admitted");
    publisher.await.unwrap();
}
