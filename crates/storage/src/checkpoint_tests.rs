// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::test_support::{admit_event, register_event};
use cortex_core::Priority;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn test_state() -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply_event(&register_event("wkr-1", &["development"], 2));
    state.apply_event(&admit_event("task-1", "fix bug", Priority::P1, 1_000));
    state
}

// =============================================================================
// Fake CheckpointWriter for testing
// =============================================================================

/// Records all I/O operations for verification.
#[derive(Debug, Clone, Default)]
struct IoLog {
    pub writes: Vec<PathBuf>,
    pub fsyncs_file: Vec<PathBuf>,
    pub fsyncs_dir: Vec<PathBuf>,
    pub renames: Vec<(PathBuf, PathBuf)>,
}

/// Fake writer that records operations and supports error injection.
#[derive(Clone, Default)]
struct FakeCheckpointWriter {
    log: Arc<Mutex<IoLog>>,
    written_data: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_fsync_file: Arc<AtomicBool>,
}

impl FakeCheckpointWriter {
    fn log(&self) -> IoLog {
        self.log.lock().unwrap().clone()
    }

    fn set_fail_fsync_file(&self, fail: bool) {
        self.fail_fsync_file.store(fail, Ordering::SeqCst);
    }
}

impl CheckpointWriter for FakeCheckpointWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
        self.log.lock().unwrap().writes.push(path.to_owned());
        self.written_data
            .lock()
            .unwrap()
            .insert(path.to_owned(), data.to_vec());
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), CheckpointError> {
        if self.fail_fsync_file.load(Ordering::SeqCst) {
            return Err(CheckpointError::Io(std::io::Error::other(
                "injected fsync failure",
            )));
        }
        self.log.lock().unwrap().fsyncs_file.push(path.to_owned());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), CheckpointError> {
        self.log
            .lock()
            .unwrap()
            .renames
            .push((from.to_owned(), to.to_owned()));
        let data = self.written_data.lock().unwrap().remove(from);
        if let Some(data) = data {
            self.written_data.lock().unwrap().insert(to.to_owned(), data);
        }
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), CheckpointError> {
        self.log.lock().unwrap().fsyncs_dir.push(path.to_owned());
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64, CheckpointError> {
        Ok(self
            .written_data
            .lock()
            .unwrap()
            .get(path)
            .map(|d| d.len() as u64)
            .unwrap_or(0))
    }
}

#[test]
fn checkpoint_orders_fsync_before_rename_before_dir_fsync() {
    let writer = FakeCheckpointWriter::default();
    let checkpointer =
        Checkpointer::with_writer(writer.clone(), PathBuf::from("/state/snapshot.zst"));

    let result = checkpointer.start(5, &test_state()).wait().unwrap();
    assert_eq!(result.seq, 5);

    let log = writer.log();
    assert_eq!(log.writes.len(), 1);
    assert_eq!(log.writes[0], PathBuf::from("/state/snapshot.tmp"));
    // Data fsync'd on the tmp file before the rename
    assert_eq!(log.fsyncs_file, vec![PathBuf::from("/state/snapshot.tmp")]);
    assert_eq!(
        log.renames,
        vec![(
            PathBuf::from("/state/snapshot.tmp"),
            PathBuf::from("/state/snapshot.zst")
        )]
    );
    // Directory fsync makes the rename durable
    assert_eq!(log.fsyncs_dir, vec![PathBuf::from("/state")]);
}

#[test]
fn failed_fsync_aborts_before_rename() {
    let writer = FakeCheckpointWriter::default();
    writer.set_fail_fsync_file(true);
    let checkpointer =
        Checkpointer::with_writer(writer.clone(), PathBuf::from("/state/snapshot.zst"));

    let result = checkpointer.start(5, &test_state()).wait();
    assert!(result.is_err());
    // No rename happened, so the old snapshot is untouched
    assert!(writer.log().renames.is_empty());
}

#[test]
fn sync_checkpoint_roundtrips_through_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    let checkpointer = Checkpointer::new(path.clone());

    let state = test_state();
    let result = checkpointer.checkpoint_sync(9, &state).unwrap();
    assert!(result.size_bytes > 0);

    let snapshot = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.seq, 9);
    assert_eq!(snapshot.state, state);
}

#[test]
fn load_snapshot_missing_returns_none() {
    let dir = tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("missing.zst"))
        .unwrap()
        .is_none());
}

#[test]
fn load_snapshot_corrupt_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    std::fs::write(&path, b"definitely not zstd").unwrap();
    assert!(matches!(
        load_snapshot(&path),
        Err(SnapshotLoadError::Corrupt(_))
    ));
}
