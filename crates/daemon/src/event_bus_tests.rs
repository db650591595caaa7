// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::test_support::{admit_event, register_event};
use cortex_core::Priority;
use cortex_storage::Wal;
use tempfile::tempdir;

#[tokio::test]
async fn wal_bus_delivers_in_order() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(&dir.path().join("events.wal"), 0).unwrap();
    let (bus, mut reader) = EventBus::new(wal);

    bus.send(register_event("wkr-1", &["development"], 1)).unwrap();
    bus.send(admit_event("task-1", "fix bug", Priority::P2, 1_000)).unwrap();

    let first = reader.recv().await.unwrap().unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.event.name(), "worker-registered");
    reader.mark_processed(first.seq);

    let second = reader.recv().await.unwrap().unwrap();
    assert_eq!(second.seq, 2);
    assert_eq!(second.event.name(), "task-admitted");
    reader.mark_processed(second.seq);
    assert_eq!(bus.processed_seq(), 2);
}

#[tokio::test]
async fn memory_bus_has_same_interface() {
    let (bus, mut reader) = EventBus::in_memory();
    bus.send(register_event("wkr-1", &[], 1)).unwrap();
    bus.flush().unwrap();
    assert!(!bus.needs_flush());

    let entry = reader.recv().await.unwrap().unwrap();
    assert_eq!(entry.seq, 1);
    reader.mark_processed(entry.seq);
    assert_eq!(bus.processed_seq(), 1);

    // No WAL behind the memory bus
    assert!(bus.with_wal(|w| w.write_seq()).is_none());
}

#[test]
fn try_drain_returns_pending_entries() {
    let (bus, mut reader) = EventBus::in_memory();
    for i in 0..3 {
        bus.send(admit_event(&format!("task-{i}"), "work", Priority::P2, i)).unwrap();
    }
    let entries = reader.try_drain().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].seq, 3);
    assert!(reader.try_drain().unwrap().is_empty());
}

#[tokio::test]
async fn recv_returns_none_when_all_senders_dropped() {
    let (bus, mut reader) = EventBus::in_memory();
    drop(bus);
    assert!(reader.recv().await.unwrap().is_none());
}
