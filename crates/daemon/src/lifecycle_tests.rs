// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::PersistenceMode;
use tempfile::TempDir;

fn test_config(dir: &TempDir, mode: PersistenceMode) -> Config {
    let state_dir = dir.path().to_path_buf();
    let mut coordinator = cortex_core::CoordinatorConfig::default();
    coordinator.persistence_mode = mode;
    Config {
        socket_path: state_dir.join("daemon.sock"),
        lock_path: state_dir.join("daemon.pid"),
        version_path: state_dir.join("daemon.version"),
        log_path: state_dir.join("daemon.log"),
        wal_path: state_dir.join("wal").join("events.wal"),
        snapshot_path: state_dir.join("snapshot.zst"),
        coordinator,
        state_dir,
    }
}

#[tokio::test]
async fn startup_creates_runtime_files() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::WriteAheadLog);

    let result = startup(&config).await.unwrap();
    assert!(config.socket_path.exists());
    assert!(config.lock_path.exists());
    assert!(config.version_path.exists());

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    drop(result);
}

#[tokio::test]
async fn second_startup_fails_on_held_lock() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::MemoryOnly);

    let first = startup(&config).await.unwrap();
    let second = startup(&config).await;
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));

    // The running daemon's files are untouched by the failed attempt
    assert!(config.lock_path.exists());
    drop(first);
}

#[tokio::test]
async fn recovery_announces_itself_on_the_bus() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::WriteAheadLog);

    let StartupResult {
        mut event_reader, ..
    } = startup(&config).await.unwrap();

    let entries = event_reader.try_drain().unwrap();
    assert_eq!(entries.len(), 1);
    match &entries[0].event {
        Event::RecoveryCompleted {
            snapshot_seq,
            replayed,
        } => {
            assert_eq!(*snapshot_seq, 0);
            assert_eq!(*replayed, 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_wal_refuses_to_start() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::WriteAheadLog);

    std::fs::create_dir_all(config.wal_path.parent().unwrap()).unwrap();
    std::fs::write(&config.wal_path, "this is not a wal\n").unwrap();

    let result = startup(&config).await;
    assert!(matches!(result, Err(LifecycleError::Wal(_))));
    // Partial startup cleaned up
    assert!(!config.socket_path.exists());
}

#[tokio::test]
async fn corrupt_snapshot_refuses_to_start() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::PeriodicSnapshot);

    std::fs::write(&config.snapshot_path, "junk").unwrap();

    let result = startup(&config).await;
    assert!(matches!(result, Err(LifecycleError::Snapshot(_))));
}

#[tokio::test]
async fn process_event_applies_and_publishes() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::MemoryOnly);
    let StartupResult { mut daemon, .. } = startup(&config).await.unwrap();

    let sub = daemon.hub.subscribe(Vec::new());
    daemon
        .process_event(cortex_core::test_support::register_event(
            "wkr-1",
            &["development"],
            2,
        ))
        .unwrap();

    assert!(daemon.state.lock().workers.contains_key("wkr-1"));
    assert_eq!(sub.try_recv().unwrap().name(), "worker-registered");
}

#[tokio::test]
async fn shutdown_saves_final_snapshot_and_removes_files() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, PersistenceMode::WriteAheadLog);
    let StartupResult {
        mut daemon,
        mut event_reader,
        ..
    } = startup(&config).await.unwrap();

    // Drain the recovery event so processed_seq is nonzero and a final
    // snapshot gets written
    for entry in event_reader.try_drain().unwrap() {
        daemon.process_event(entry.event).unwrap();
        event_reader.mark_processed(entry.seq);
    }
    daemon
        .process_event(cortex_core::test_support::register_event(
            "wkr-1",
            &["development"],
            2,
        ))
        .unwrap();

    daemon.shutdown().unwrap();

    assert!(!config.socket_path.exists());
    assert!(!config.version_path.exists());
    assert!(config.snapshot_path.exists());
}
