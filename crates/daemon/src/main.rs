// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cortex coordination daemon (cortexd)
//!
//! Background process that owns the engine loop and routes tasks.
//!
//! Architecture:
//! - Listener task: spawned task handling socket I/O, emits events to the bus
//! - Engine loop: main task processing events sequentially
//! - Sweepers: heartbeat supervision and TTL enforcement on timers
//! - Flush + checkpoint tasks: durability according to the persistence mode

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use cortex_core::{Clock, Event, PersistenceMode, SystemClock};
use cortex_daemon::event_bus::EventBus;
use cortex_daemon::hub::SubscriberHub;
use cortex_daemon::lifecycle::{self, Config, LifecycleError, Phase, StartupResult};
use cortex_daemon::listener::{ListenCtx, Listener};
use cortex_storage::Checkpointer;
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("cortexd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("cortexd {}", env!("CARGO_PKG_VERSION"));
                println!("Cortex coordination daemon - routes tasks to workers and supervises them");
                println!();
                println!("USAGE:");
                println!("    cortexd");
                println!();
                println!("The daemon listens on a Unix socket under the state directory");
                println!("(CORTEX_STATE_DIR, default ~/.local/state/cortex). Clients and");
                println!("workers speak the length-prefixed JSON protocol over that socket.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: cortexd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    // Load configuration (user-level daemon)
    let config = Config::load()?;

    // Rotate log file if it has grown too large
    rotate_log_if_needed(&config.log_path);

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting coordination daemon");

    let StartupResult {
        mut daemon,
        listener: unix_listener,
        mut event_reader,
    } = match lifecycle::startup(&config).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            // Another daemon is already running — print a human-readable
            // message instead of a raw debug error.
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("cortexd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Shutdown signal: not an event, so shutdown requests are never
    // persisted to the WAL and replayed on the next startup.
    let shutdown_notify = Arc::new(Notify::new());

    // Spawn listener task
    let ctx = Arc::new(ListenCtx {
        event_bus: daemon.event_bus.clone(),
        state: Arc::clone(&daemon.state),
        runtime: Arc::clone(&daemon.runtime),
        hub: Arc::clone(&daemon.hub),
        phase: Arc::clone(&daemon.phase),
        persistence_mode: config.coordinator.persistence_mode,
        start_time: daemon.start_time,
        shutdown: Arc::clone(&shutdown_notify),
    });
    let listener = Listener::new(unix_listener, ctx);
    tokio::spawn(listener.run());

    // Spawn durability tasks according to the persistence mode
    match config.coordinator.persistence_mode {
        PersistenceMode::WriteAheadLog => {
            spawn_flush_task(
                daemon.event_bus.clone(),
                Arc::clone(&daemon.phase),
                Arc::clone(&daemon.hub),
            );
            spawn_checkpoint(
                daemon.event_bus.clone(),
                Arc::clone(&daemon.state),
                Arc::clone(&daemon.hub),
                config.snapshot_path.clone(),
                config.coordinator.snapshot_interval(),
                true,
            );
        }
        PersistenceMode::PeriodicSnapshot => {
            spawn_checkpoint(
                daemon.event_bus.clone(),
                Arc::clone(&daemon.state),
                Arc::clone(&daemon.hub),
                config.snapshot_path.clone(),
                config.coordinator.snapshot_interval(),
                false,
            );
        }
        PersistenceMode::MemoryOnly => {}
    }

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        "Daemon ready, listening on {}",
        config.socket_path.display()
    );

    // Signal ready for parent process (e.g., systemd, a CLI waiting for startup)
    println!("READY");
    *daemon.phase.lock() = Phase::Ok;

    // Sweep timers.
    // NOTE: Must be created outside the loop - tokio::select! re-evaluates
    // branches on each iteration, so using sleep() inside would reset on
    // every event and the sweeps would never fire during activity.
    let mut heartbeat_sweep =
        tokio::time::interval(config.coordinator.heartbeat_check_interval());
    let mut ttl_sweep = tokio::time::interval(config.coordinator.ttl_sweep_interval());

    // Engine loop - processes events sequentially from the bus
    loop {
        tokio::select! {
            // Process events from the durable event reader
            result = event_reader.recv() => {
                match result {
                    Ok(Some(entry)) => {
                        let seq = entry.seq;
                        match entry.event {
                            Event::Shutdown => {
                                // Control signal; never replayed on restart
                                event_reader.mark_processed(seq);
                            }
                            event => {
                                match daemon.process_event(event) {
                                    Ok(()) => event_reader.mark_processed(seq),
                                    Err(e) => {
                                        // Mark processed - an unprocessable
                                        // event must not wedge the loop; if it
                                        // can't be processed now it won't be
                                        // processable later either.
                                        error!("Error processing event (seq={}): {}", seq, e);
                                        event_reader.mark_processed(seq);
                                    }
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        info!("Event bus closed, shutting down...");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading from event bus: {}", e);
                    }
                }
            }

            // Shutdown requested via command
            _ = shutdown_notify.notified() => {
                info!("Shutdown requested via command");
                break;
            }

            // Graceful shutdown on SIGTERM
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }

            // Graceful shutdown on SIGINT
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }

            // Heartbeat supervision
            _ = heartbeat_sweep.tick() => {
                let now_ms = SystemClock.epoch_ms();
                for event in daemon.runtime.sweep_heartbeats(now_ms) {
                    if let Err(e) = daemon.event_bus.send(event) {
                        error!("Failed to send sweep event: {}", e);
                    }
                }
            }

            // TTL, cancel grace, and retention
            _ = ttl_sweep.tick() => {
                let now_ms = SystemClock.epoch_ms();
                for event in daemon.runtime.sweep_ttl(now_ms) {
                    if let Err(e) = daemon.event_bus.send(event) {
                        error!("Failed to send sweep event: {}", e);
                    }
                }
            }
        }
    }

    // Graceful shutdown: admissions stop, WAL flushes, final snapshot saved.
    // A hard-kill watchdog bounds the grace period in case teardown wedges.
    *daemon.phase.lock() = Phase::Stopping;
    std::thread::spawn(|| {
        std::thread::sleep(SHUTDOWN_GRACE);
        eprintln!("cortexd: graceful shutdown timed out, exiting");
        std::process::exit(1);
    });
    daemon.shutdown()?;
    info!("Daemon stopped");
    Ok(())
}

/// Bound on graceful shutdown before the watchdog hard-kills the process.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Flush interval for group commit (~10ms durability window)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive flush failures before entering degraded-read-only mode.
const DEGRADED_THRESHOLD: u32 = 5;

/// Spawn a task that periodically flushes the event bus.
///
/// Flush failures are retried with exponential backoff; persistent failure
/// escalates the daemon into degraded-read-only mode (admissions refused,
/// queries served) until a flush succeeds again.
fn spawn_flush_task(event_bus: EventBus, phase: Arc<Mutex<Phase>>, hub: Arc<SubscriberHub>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        let mut failures: u32 = 0;

        loop {
            interval.tick().await;

            if !event_bus.needs_flush() && failures == 0 {
                continue;
            }

            match event_bus.flush() {
                Ok(()) => {
                    if failures >= DEGRADED_THRESHOLD {
                        let mut phase = phase.lock();
                        if *phase == Phase::Degraded {
                            *phase = Phase::Ok;
                            drop(phase);
                            info!("persistence recovered, leaving degraded mode");
                            hub.publish(&Event::DegradedModeExited);
                        }
                    }
                    failures = 0;
                }
                Err(e) => {
                    failures += 1;
                    error!(failures, "Failed to flush event bus: {}", e);

                    if failures == DEGRADED_THRESHOLD {
                        let mut phase = phase.lock();
                        if *phase == Phase::Ok {
                            *phase = Phase::Degraded;
                            drop(phase);
                            warn!("entering degraded-read-only mode");
                            hub.publish(&Event::DegradedModeEntered {
                                reason: e.to_string(),
                            });
                        }
                    }

                    // Bounded exponential backoff between retries
                    let backoff =
                        Duration::from_millis(100u64.saturating_mul(1 << failures.min(6)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    });
}

/// Spawn a task that periodically saves snapshots (and truncates the WAL
/// in write-ahead-log mode).
///
/// ## Durability Guarantee
///
/// WAL truncation only happens after the snapshot is fully durable:
/// 1. Snapshot written to temp file
/// 2. Temp file fsync'd
/// 3. Atomic rename to final path
/// 4. Directory fsync'd (makes rename durable across power loss)
/// 5. THEN truncate WAL
fn spawn_checkpoint(
    event_bus: EventBus,
    state: Arc<Mutex<cortex_storage::MaterializedState>>,
    hub: Arc<SubscriberHub>,
    snapshot_path: std::path::PathBuf,
    interval: Duration,
    truncate_wal: bool,
) {
    let checkpointer = Checkpointer::new(snapshot_path);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;

            // Get current state and processed seq (brief lock)
            let (state_ref, processed_seq) = {
                let state_guard = state.lock();
                (state_guard.clone(), event_bus.processed_seq())
            };

            // Only checkpoint if we've processed some events
            if processed_seq == 0 {
                continue;
            }

            // Start background checkpoint (I/O happens on its own thread)
            let handle = checkpointer.start(processed_seq, &state_ref);
            let result = tokio::task::spawn_blocking(move || handle.wait()).await;

            match result {
                Ok(Ok(checkpoint_result)) => {
                    tracing::debug!(
                        seq = checkpoint_result.seq,
                        size_bytes = checkpoint_result.size_bytes,
                        "checkpoint complete"
                    );

                    hub.publish(&Event::SnapshotCreated {
                        seq: checkpoint_result.seq,
                        size_bytes: checkpoint_result.size_bytes,
                    });

                    // NOW safe to truncate WAL (snapshot is durable)
                    if truncate_wal {
                        let truncated =
                            event_bus.with_wal(|wal| wal.truncate_before(processed_seq));
                        if let Some(Err(e)) = truncated {
                            tracing::warn!(
                                error = %e,
                                "failed to truncate WAL after checkpoint"
                            );
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "checkpoint failed, WAL not truncated");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "checkpoint task panicked");
                }
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    // Shift older rotations: .3 is deleted, .2→.3, .1→.2
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Rotate current log → .1
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Create log directory if needed
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Set up file appender (rotation happens at startup via rotate_log_if_needed)
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
