// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery: WAL replay reproduces the pre-crash state exactly.

use crate::prelude::*;
use cortex_core::task::TaskState;
use tempfile::tempdir;

#[test]
fn replay_reproduces_state_after_crash() {
    let dir = tempdir().unwrap();

    let pre_crash = {
        let mut c = Coordinator::new_wal(dir.path());
        let w1 = c.register(&["development"], 1);
        let t1 = c.submit("fix bug one");
        let t2 = c.submit("fix bug two");
        let t3 = c.submit("fix bug three");

        // T1 rides the single slot; T2 and T3 wait behind it
        assert_eq!(c.task(&t1).worker_id.as_ref(), Some(&w1));
        assert_eq!(c.task(&t2).state, TaskState::Queued);
        assert_eq!(c.task(&t3).state, TaskState::Queued);

        c.report_success(&w1, &t1);
        assert_eq!(c.task(&t1).state, TaskState::Completed);
        // Freed capacity moved T2 onto the worker before the crash
        assert_eq!(c.task(&t2).state, TaskState::Assigned);

        c.bus.flush().unwrap();
        c.state_clone()
        // Coordinator dropped here: crash before any snapshot
    };

    let recovered = recover_state(dir.path());

    // The replayed state is exactly the pre-crash state: counters, queue
    // ordering, assignments, everything
    assert_eq!(recovered, pre_crash);
    recovered.check_invariants().unwrap();

    assert_eq!(recovered.tasks["task-s-2"].state, TaskState::Completed);
    assert_eq!(recovered.tasks["task-s-3"].state, TaskState::Assigned);
    assert_eq!(recovered.tasks["task-s-4"].state, TaskState::Queued);
    assert_eq!(recovered.workers["wkr-s-1"].load, 1);
}

#[test]
fn snapshot_then_partial_wal_replay() {
    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join("snapshot.zst");

    let (snapshot_seq, pre_crash) = {
        let mut c = Coordinator::new_wal(dir.path());
        let w1 = c.register(&["development"], 2);
        let t1 = c.submit("fix bug one");

        // Checkpoint mid-stream
        c.bus.flush().unwrap();
        let seq = c.bus.processed_seq();
        let checkpointer = cortex_storage::Checkpointer::new(snapshot_path.clone());
        checkpointer.checkpoint_sync(seq, &c.state_clone()).unwrap();

        // More work after the snapshot
        c.report_success(&w1, &t1);
        c.submit("fix bug two");
        c.bus.flush().unwrap();

        (seq, c.state_clone())
    };

    // Recovery: snapshot first, then replay only entries after its seq
    let snapshot = cortex_storage::load_snapshot(&snapshot_path)
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.seq, snapshot_seq);
    let mut state = snapshot.state;
    let wal = cortex_storage::Wal::open(&dir.path().join("events.wal"), snapshot.seq).unwrap();
    for entry in wal.entries_after(snapshot.seq).unwrap() {
        state.apply_event(&entry.event);
    }

    assert_eq!(state, pre_crash);
    state.check_invariants().unwrap();
}
