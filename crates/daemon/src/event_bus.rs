// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for daemon communication.
//!
//! In `write-ahead-log` mode the bus writes events to the WAL before
//! notifying the engine, enabling crash recovery via snapshot + replay.
//! Events are buffered in memory and periodically flushed to disk (~10ms
//! durability window). The other persistence modes use an in-memory log
//! with the same interface: ordering and single delivery are identical,
//! only durability differs.

use cortex_core::Event;
use cortex_storage::{Wal, WalEntry, WalError};
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// In-memory substitute for the WAL in non-durable modes.
#[derive(Default)]
struct MemoryLog {
    entries: VecDeque<WalEntry>,
    write_seq: u64,
    processed_seq: u64,
}

enum Log {
    Wal(Wal),
    Memory(MemoryLog),
}

impl Log {
    fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        match self {
            Log::Wal(wal) => wal.append(event),
            Log::Memory(log) => {
                log.write_seq += 1;
                log.entries.push_back(WalEntry {
                    seq: log.write_seq,
                    event: event.clone(),
                });
                Ok(log.write_seq)
            }
        }
    }

    fn flush(&mut self) -> Result<(), WalError> {
        match self {
            Log::Wal(wal) => wal.flush(),
            Log::Memory(_) => Ok(()),
        }
    }

    fn needs_flush(&self) -> bool {
        match self {
            Log::Wal(wal) => wal.needs_flush(),
            Log::Memory(_) => false,
        }
    }

    fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        match self {
            Log::Wal(wal) => wal.next_unprocessed(),
            Log::Memory(log) => Ok(log.entries.pop_front()),
        }
    }

    fn mark_processed(&mut self, seq: u64) {
        match self {
            Log::Wal(wal) => wal.mark_processed(seq),
            Log::Memory(log) => log.processed_seq = seq,
        }
    }

    fn processed_seq(&self) -> u64 {
        match self {
            Log::Wal(wal) => wal.processed_seq(),
            Log::Memory(log) => log.processed_seq,
        }
    }
}

/// Event bus, durable or in-memory depending on the persistence mode.
///
/// Events are written to the log before notifying the engine. This
/// provides durability with group commit for performance.
#[derive(Clone)]
pub struct EventBus {
    log: Arc<Mutex<Log>>,
    wake_tx: mpsc::Sender<()>,
}

/// Reader for the event bus.
///
/// Used by the engine loop to process events sequentially.
pub struct EventReader {
    log: Arc<Mutex<Log>>,
    wake_rx: mpsc::Receiver<()>,
}

impl EventBus {
    /// Create a WAL-backed bus. Returns both the bus (for sending) and the
    /// reader (for the engine loop).
    pub fn new(wal: Wal) -> (Self, EventReader) {
        Self::from_log(Log::Wal(wal))
    }

    /// Create an in-memory bus for the non-durable persistence modes.
    pub fn in_memory() -> (Self, EventReader) {
        Self::from_log(Log::Memory(MemoryLog::default()))
    }

    fn from_log(log: Log) -> (Self, EventReader) {
        let log = Arc::new(Mutex::new(log));
        let (wake_tx, wake_rx) = mpsc::channel(1);

        (
            Self {
                log: Arc::clone(&log),
                wake_tx,
            },
            EventReader { log, wake_rx },
        )
    }

    /// Append an event (buffered, not yet durable).
    ///
    /// Returns the assigned sequence number. Call `flush()` to make durable.
    pub fn send(&self, event: Event) -> Result<u64, WalError> {
        let seq = {
            let mut log = self.log.lock();
            log.append(&event)?
        };
        // Non-blocking wake - if channel is full, engine is already awake
        let _ = self.wake_tx.try_send(());
        Ok(seq)
    }

    /// Flush buffered events to disk with a single fsync.
    ///
    /// This is the durability point for all buffered events.
    pub fn flush(&self) -> Result<(), WalError> {
        let mut log = self.log.lock();
        log.flush()
    }

    /// Check if the log needs flushing (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        let log = self.log.lock();
        log.needs_flush()
    }

    /// Return the last processed sequence number.
    pub fn processed_seq(&self) -> u64 {
        let log = self.log.lock();
        log.processed_seq()
    }

    /// Run an operation against the underlying WAL, if this bus has one.
    ///
    /// Used by the checkpoint task for truncation after a durable snapshot.
    pub fn with_wal<T>(&self, f: impl FnOnce(&mut Wal) -> T) -> Option<T> {
        let mut log = self.log.lock();
        match &mut *log {
            Log::Wal(wal) => Some(f(wal)),
            Log::Memory(_) => None,
        }
    }
}

impl EventReader {
    /// Wait for and return the next unprocessed event.
    ///
    /// Returns `None` when the bus is closed (all senders dropped).
    pub async fn recv(&mut self) -> Result<Option<WalEntry>, WalError> {
        loop {
            // Check for unprocessed events
            {
                let mut log = self.log.lock();
                if let Some(entry) = log.next_unprocessed()? {
                    return Ok(Some(entry));
                }
            }

            // Wait for wake signal
            if self.wake_rx.recv().await.is_none() {
                // All senders dropped
                return Ok(None);
            }
        }
    }

    /// Mark an entry as processed.
    ///
    /// This updates the in-memory processed_seq. Actual persistence
    /// happens via snapshots.
    pub fn mark_processed(&self, seq: u64) {
        let mut log = self.log.lock();
        log.mark_processed(seq);
    }

    /// Drain and process everything currently in the log without waiting.
    ///
    /// Test helper for driving the engine loop synchronously.
    pub fn try_drain(&mut self) -> Result<Vec<WalEntry>, WalError> {
        let mut entries = Vec::new();
        let mut log = self.log.lock();
        while let Some(entry) = log.next_unprocessed()? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
