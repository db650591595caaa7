// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cortex-storage: durable snapshot + write-ahead log for the coordinator.
//!
//! State is event-sourced: every mutation is an [`cortex_core::Event`]
//! appended to the WAL before the engine applies it to the
//! [`MaterializedState`]. Periodic checkpoints compact the WAL into a
//! zstd-compressed snapshot.

mod checkpoint;
mod snapshot;
mod state;
mod wal;

pub use checkpoint::{
    load_snapshot, CheckpointError, CheckpointResult, CheckpointWriter, Checkpointer,
    SnapshotLoadError,
};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{CategoryStats, MaterializedState};
pub use wal::{Wal, WalEntry, WalError};
