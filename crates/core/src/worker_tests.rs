// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn worker() -> Worker {
    Worker::new(
        WorkerId::new("wkr-1"),
        ["development".to_string()],
        2,
        1_000_000,
    )
}

#[test]
fn new_worker_starts_idle_with_zero_load() {
    let w = worker();
    assert_eq!(w.state, WorkerState::Idle);
    assert_eq!(w.load, 0);
    assert_eq!(w.last_heartbeat_ms, 1_000_000);
}

#[yare::parameterized(
    idle         = { WorkerState::Idle, true },
    busy         = { WorkerState::Busy, true },
    registering  = { WorkerState::Registering, false },
    draining     = { WorkerState::Draining, false },
    timed_out    = { WorkerState::TimedOut, false },
    unregistered = { WorkerState::Unregistered, false },
)]
fn admissible_states(state: WorkerState, expected: bool) {
    assert_eq!(state.admissible(), expected);
}

#[test]
fn sync_state_tracks_load() {
    let mut w = worker();
    w.load = 1;
    w.sync_state();
    assert_eq!(w.state, WorkerState::Busy);
    w.load = 0;
    w.sync_state();
    assert_eq!(w.state, WorkerState::Idle);
}

#[test]
fn sync_state_does_not_revive_timed_out() {
    let mut w = worker();
    w.state = WorkerState::TimedOut;
    w.load = 0;
    w.sync_state();
    assert_eq!(w.state, WorkerState::TimedOut);
}

#[test]
fn has_capacity_respects_max_and_state() {
    let mut w = worker();
    assert!(w.has_capacity());
    w.load = 2;
    w.sync_state();
    assert!(!w.has_capacity());
    w.load = 1;
    w.state = WorkerState::Draining;
    assert!(!w.has_capacity());
}

#[test]
fn heartbeat_ring_is_bounded() {
    let mut w = worker();
    for i in 0..(HEARTBEAT_LOG_CAPACITY as u64 + 10) {
        w.push_heartbeat(HeartbeatRecord {
            at_ms: 1_000_000 + i,
            status: BeatStatus::Idle,
            progress: BTreeMap::new(),
        });
    }
    assert_eq!(w.heartbeats.len(), HEARTBEAT_LOG_CAPACITY);
    // Oldest overwritten: the front is now record 10
    assert_eq!(w.heartbeats.front().map(|r| r.at_ms), Some(1_000_010));
    assert_eq!(w.last_heartbeat_ms, 1_000_000 + HEARTBEAT_LOG_CAPACITY as u64 + 9);
}

#[test]
fn silent_for_measures_from_last_heartbeat() {
    let mut w = worker();
    w.push_heartbeat(HeartbeatRecord {
        at_ms: 1_005_000,
        status: BeatStatus::Busy,
        progress: BTreeMap::new(),
    });
    assert_eq!(w.silent_for_ms(1_012_000), 7_000);
}
