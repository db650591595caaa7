// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener runs in a spawned task, accepting connections and handling
//! them without blocking the engine loop. It contains no business logic:
//! requests are marshaled into runtime calls and events onto the event
//! bus, and results are marshaled back into responses. A `Subscribe`
//! request upgrades the connection into a push-channel event stream.

mod mutations;
mod query;

use std::sync::Arc;
use std::time::Instant;

use cortex_core::{Clock, PersistenceMode, SystemClock};
use cortex_storage::MaterializedState;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::event_bus::EventBus;
use crate::hub::SubscriberHub;
use crate::lifecycle::{DaemonRuntime, Phase};
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub event_bus: EventBus,
    pub state: Arc<Mutex<MaterializedState>>,
    pub runtime: Arc<DaemonRuntime>,
    pub hub: Arc<SubscriberHub>,
    pub phase: Arc<Mutex<Phase>>,
    pub persistence_mode: PersistenceMode,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("WAL error")]
    WalError,
}

impl Listener {
    /// Create a new listener.
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Run the listener loop until shutdown, spawning tasks for each connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Log queries at debug level (frequent polling), other requests at info
    if matches!(request, Request::Query { .. } | Request::Heartbeat { .. }) {
        debug!(request = ?request, "received request");
    } else {
        tracing::info!(request = ?request, "received request");
    }

    // A subscription holds the connection open and streams event frames
    let request = match request {
        Request::Subscribe { kinds } => {
            let subscription = ctx.hub.subscribe(kinds);
            protocol::write_response(&mut writer, &Response::Subscribed, DEFAULT_TIMEOUT).await?;
            loop {
                let event = subscription.recv().await;
                let data = protocol::encode(&event)?;
                if protocol::write_message(&mut writer, &data).await.is_err() {
                    // Client went away; drop the subscription
                    return Ok(());
                }
            }
        }
        other => other,
    };

    // Handle request, tracking operation latency for metrics
    let started = Instant::now();
    let response = handle_request(request, ctx)?;
    ctx.runtime
        .metrics()
        .record_op(SystemClock.epoch_ms(), started.elapsed());

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;

    Ok(())
}

/// Handle a single request and return a response.
fn handle_request(request: Request, ctx: &ListenCtx) -> Result<Response, ConnectionError> {
    match request {
        Request::Ping => Ok(Response::Pong),

        Request::Hello { version: _ } => Ok(Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        }),

        Request::Submit {
            description,
            declared_type,
            priority,
            ttl_ms,
            max_retries,
        } => mutations::handle_submit(
            ctx,
            cortex_engine::SubmitRequest {
                description,
                declared_type,
                priority,
                ttl_ms,
                max_retries,
            },
        ),

        Request::RegisterWorker {
            capabilities,
            max_concurrent,
        } => mutations::handle_register(ctx, capabilities, max_concurrent),

        Request::UnregisterWorker { worker_id } => mutations::handle_unregister(ctx, &worker_id),

        Request::Heartbeat {
            worker_id,
            status,
            progress,
        } => mutations::handle_heartbeat(ctx, &worker_id, status, progress),

        Request::Report {
            worker_id,
            task_id,
            outcome,
            detail,
        } => mutations::handle_report(ctx, &worker_id, &task_id, outcome, detail),

        Request::Cancel { task_id } => mutations::handle_cancel(ctx, &task_id),

        Request::Query { query } => Ok(query::handle_query(ctx, query)),

        Request::Shutdown => {
            *ctx.phase.lock() = Phase::Stopping;
            ctx.shutdown.notify_one();
            Ok(Response::ShuttingDown)
        }

        // Reached only if a Subscribe arrives after another request was
        // already handled on this connection
        Request::Subscribe { .. } => Ok(Response::Error {
            kind: "protocol".to_string(),
            message: "subscribe must be the first request on a connection".to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_ctx(dir: &std::path::Path) -> ListenCtx {
    use cortex_core::CoordinatorConfig;
    use cortex_engine::Runtime;

    let wal = cortex_storage::Wal::open(&dir.join("test.wal"), 0).unwrap();
    let (event_bus, _reader) = EventBus::new(wal);
    let state = Arc::new(Mutex::new(MaterializedState::default()));
    let config = CoordinatorConfig::default();
    let runtime = Arc::new(Runtime::new(Arc::clone(&state), config.clone(), SystemClock));
    ListenCtx {
        event_bus,
        state,
        runtime,
        hub: Arc::new(SubscriberHub::new(config.subscriber_buffer_depth)),
        phase: Arc::new(Mutex::new(Phase::Ok)),
        persistence_mode: config.persistence_mode,
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
