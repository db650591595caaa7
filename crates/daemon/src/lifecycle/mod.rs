// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use parking_lot::Mutex;

use cortex_core::{CoordinatorConfig, Event, PersistenceMode, SystemClock};
use cortex_engine::{Runtime, RuntimeError};
use cortex_storage::{
    load_snapshot, Checkpointer, MaterializedState, SnapshotLoadError, Wal, WalError,
};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::event_bus::{EventBus, EventReader};
use crate::hub::SubscriberHub;

/// Daemon runtime with the production clock.
pub type DaemonRuntime = Runtime<SystemClock>;

/// Daemon lifecycle phase, reported in the health summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Ok,
    /// Persistence is failing: admissions refused, queries served.
    Degraded,
    Stopping,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Ok => "ok",
            Phase::Degraded => "degraded",
            Phase::Stopping => "stopping",
        }
    }
}

/// Daemon configuration: filesystem paths plus coordinator tunables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/cortex)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to WAL file
    pub wal_path: PathBuf,
    /// Path to snapshot file
    pub snapshot_path: PathBuf,
    /// Coordinator tunables from config.toml (defaults when absent)
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/cortex/` (or
    /// `$XDG_STATE_HOME/cortex/`), with the WAL and snapshot paths
    /// overridable from config.toml.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let coordinator = CoordinatorConfig::load(&state_dir.join("config.toml"))
            .map_err(|e| LifecycleError::Config(e.to_string()))?;

        let wal_path = coordinator
            .wal_path
            .clone()
            .unwrap_or_else(|| state_dir.join("wal").join("events.wal"));
        let snapshot_path = coordinator
            .snapshot_path
            .clone()
            .unwrap_or_else(|| state_dir.join("snapshot.zst"));

        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_path,
            snapshot_path,
            coordinator,
            state_dir,
        })
    }
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup to be spawned as a task.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Materialized state (shared with runtime and listener)
    pub state: Arc<Mutex<MaterializedState>>,
    /// Runtime for event processing
    pub runtime: Arc<DaemonRuntime>,
    /// Durable event bus
    pub event_bus: EventBus,
    /// Push-channel fan-out
    pub hub: Arc<SubscriberHub>,
    /// Lifecycle phase for health reporting
    pub phase: Arc<Mutex<Phase>>,
    /// When daemon started
    pub start_time: Instant,
}

/// Result of daemon startup - includes both the daemon state and the listener.
pub struct StartupResult {
    /// The daemon state for event processing
    pub daemon: DaemonState,
    /// The Unix socket listener to spawn as a task
    pub listener: UnixListener,
    /// Event reader for the engine loop
    pub event_reader: EventReader,
}

impl DaemonState {
    /// Process an event through the runtime.
    ///
    /// The event is applied to materialized state, handled (result events
    /// are eagerly applied and persisted for the next loop iteration), and
    /// fanned out to push-channel subscribers. Every WAL entry flows
    /// through here exactly once, which preserves per-subject ordering on
    /// the push channel.
    pub fn process_event(&mut self, event: Event) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            state.apply_event(&event);
        }

        let result_events = self.runtime.handle_event(&event)?;
        for result_event in result_events {
            if let Err(e) = self.event_bus.send(result_event) {
                warn!("Failed to persist runtime result event: {}", e);
            }
        }

        self.hub.publish(&event);
        Ok(())
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Admissions have already stopped (phase is Stopping). Flush the WAL,
    /// save a final snapshot so the next startup avoids a long replay, and
    /// remove the runtime files in reverse of startup order.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Flush buffered WAL events to disk before tearing down
        if let Err(e) = self.event_bus.flush() {
            warn!("Failed to flush WAL on shutdown: {}", e);
        }

        // 2. Save final snapshot (durable modes only)
        let processed_seq = self.event_bus.processed_seq();
        if self.config.coordinator.persistence_mode != PersistenceMode::MemoryOnly
            && processed_seq > 0
        {
            let state_clone = self.state.lock().clone();
            let checkpointer = Checkpointer::new(self.config.snapshot_path.clone());
            match checkpointer.checkpoint_sync(processed_seq, &state_clone) {
                Ok(result) => info!(
                    seq = result.seq,
                    size_bytes = result.size_bytes,
                    "saved final shutdown snapshot"
                ),
                Err(e) => warn!("Failed to save shutdown snapshot: {}", e),
            }
        }

        // 3. Remove socket file (listener task stops when the runtime exits)
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 4. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 5. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotLoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Use OpenOptions to avoid truncating the file before we hold the lock,
    // which would wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file (truncate now that we hold the lock)
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file; // Drop mutability

    // 3. Create remaining directories and version file
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 4. Recover state per persistence mode. A corrupt snapshot or WAL is
    // fatal: the daemon refuses to start on partial state.
    let mode = config.coordinator.persistence_mode;
    let mut state = MaterializedState::default();
    let mut snapshot_seq = 0u64;
    if mode != PersistenceMode::MemoryOnly {
        match load_snapshot(&config.snapshot_path)? {
            Some(snapshot) => {
                info!(
                    seq = snapshot.seq,
                    workers = snapshot.state.workers.len(),
                    tasks = snapshot.state.tasks.len(),
                    "loaded snapshot"
                );
                state = snapshot.state;
                snapshot_seq = snapshot.seq;
            }
            None => info!("No snapshot found, starting with empty state"),
        }
    }

    let mut replayed = 0u64;
    let (event_bus, event_reader) = match mode {
        PersistenceMode::WriteAheadLog => {
            let event_wal = Wal::open(&config.wal_path, snapshot_seq)?;
            let entries = event_wal.entries_after(snapshot_seq)?;
            replayed = entries.len() as u64;
            for entry in &entries {
                state.apply_event(&entry.event);
            }
            EventBus::new(event_wal)
        }
        PersistenceMode::PeriodicSnapshot | PersistenceMode::MemoryOnly => EventBus::in_memory(),
    };

    if replayed > 0 {
        info!(replayed, after_seq = snapshot_seq, "replayed WAL events");
    }

    info!(
        workers = state.workers.len(),
        tasks = state.tasks.len(),
        queued = state.queue.len(),
        "recovered state"
    );

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 6. Wrap state and create the runtime and hub
    let state = Arc::new(Mutex::new(state));
    let runtime = Arc::new(Runtime::new(
        Arc::clone(&state),
        config.coordinator.clone(),
        SystemClock,
    ));
    let hub = Arc::new(SubscriberHub::new(
        config.coordinator.subscriber_buffer_depth,
    ));

    // 7. Announce recovery to observers; this rides the bus so it is
    // ordered with everything that follows it
    if let Err(e) = event_bus.send(Event::RecoveryCompleted {
        snapshot_seq,
        replayed,
    }) {
        warn!("Failed to emit recovery event: {}", e);
    }

    info!("Daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            state,
            runtime,
            event_bus,
            hub,
            phase: Arc::new(Mutex::new(Phase::Starting)),
            start_time: Instant::now(),
        },
        listener,
        event_reader,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove version file
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "../lifecycle_tests.rs"]
mod tests;
