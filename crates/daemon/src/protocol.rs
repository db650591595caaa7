// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. After a
//! successful `Subscribe`, the same connection switches to a stream of
//! length-prefixed event frames.

use std::collections::BTreeMap;

use cortex_core::{BeatStatus, PersistenceMode, Priority, Task, Worker};
use cortex_engine::MetricsSnapshot;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Submit a task for routing
    Submit {
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        declared_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_retries: Option<u32>,
    },

    /// Register a worker
    RegisterWorker {
        capabilities: Vec<String>,
        max_concurrent: u32,
    },

    /// Begin graceful worker unregistration
    UnregisterWorker { worker_id: String },

    /// Worker liveness signal with optional per-task progress
    Heartbeat {
        worker_id: String,
        status: BeatStatus,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        progress: BTreeMap<String, u8>,
    },

    /// Worker reports a task finished
    Report {
        worker_id: String,
        task_id: String,
        outcome: ReportOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// Cancel a task
    Cancel { task_id: String },

    /// Query state
    Query { query: Query },

    /// Subscribe this connection to the push channel
    Subscribe {
        /// Event kinds to receive; empty means all public events
        #[serde(default)]
        kinds: Vec<String>,
    },

    /// Request daemon shutdown
    Shutdown,
}

/// Worker-declared task outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportOutcome {
    Success,
    Failure,
}

/// Query types for reading daemon state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    /// Daemon health summary
    Health,
    /// Operation and state metrics
    Metrics,
    GetTask {
        id: String,
    },
    GetWorker {
        id: String,
    },
    ListTasks {
        /// Filter by lifecycle state name (e.g. "queued")
        #[serde(default)]
        state: Option<String>,
        /// Filter by routed category
        #[serde(default)]
        category: Option<String>,
    },
    ListWorkers,
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// Task admitted and routed
    Submitted {
        task_id: String,
        status: String,
        category: String,
        scores: BTreeMap<String, f64>,
        #[serde(default)]
        flagged: bool,
    },

    /// Submission refused by the input validator
    Rejected {
        rejected: bool,
        task_id: String,
        reason: String,
        threats: Vec<String>,
    },

    /// Worker registered
    Registered {
        worker_id: String,
        heartbeat_interval_ms: u64,
    },

    /// Worker is draining (or already gone when `outstanding` is empty)
    Unregistering {
        worker_id: String,
        outstanding: Vec<String>,
    },

    /// Heartbeat acknowledged
    HeartbeatAck {
        state: String,
        assignments: Vec<AssignmentNote>,
    },

    /// Cancel accepted; `pending` when awaiting worker confirmation
    Cancelled { task_id: String, pending: bool },

    /// Subscription established; event frames follow on this connection
    Subscribed,

    /// Single task details
    Task { task: Option<Box<TaskDetail>> },

    /// List of tasks
    Tasks { tasks: Vec<TaskSummary> },

    /// Single worker details
    Worker { worker: Option<Box<WorkerDetail>> },

    /// List of workers
    Workers { workers: Vec<WorkerSummary> },

    /// Daemon health summary
    Health { health: HealthSummary },

    /// Metrics summary
    Metrics { metrics: MetricsSummary },

    /// Error response with a machine-readable kind
    Error { kind: String, message: String },
}

/// An assignment delivered in a heartbeat ack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentNote {
    pub task_id: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
}

/// Summary of a task for listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    pub state: String,
    pub category: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub submitted_at_ms: u64,
}

/// Detailed task information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDetail {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    pub state: String,
    pub category: String,
    pub priority: Priority,
    pub scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub ttl_ms: u64,
    pub submitted_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&Task> for TaskDetail {
    fn from(t: &Task) -> Self {
        TaskDetail {
            id: t.id.to_string(),
            description: t.description.clone(),
            declared_type: t.declared_type.clone(),
            state: t.state.to_string(),
            category: t.category.clone(),
            priority: t.priority,
            scores: t.scores.clone(),
            worker_id: t.worker_id.as_ref().map(|w| w.to_string()),
            retry_count: t.retry_count,
            max_retries: t.max_retries,
            ttl_ms: t.ttl_ms,
            submitted_at_ms: t.submitted_at_ms,
            finished_at_ms: t.finished_at_ms,
            flagged: t.flagged,
            failure: t.failure.clone(),
        }
    }
}

impl From<&Task> for TaskSummary {
    fn from(t: &Task) -> Self {
        TaskSummary {
            id: t.id.to_string(),
            state: t.state.to_string(),
            category: t.category.clone(),
            priority: t.priority,
            worker_id: t.worker_id.as_ref().map(|w| w.to_string()),
            retry_count: t.retry_count,
            submitted_at_ms: t.submitted_at_ms,
        }
    }
}

/// Summary of a worker for listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerSummary {
    pub id: String,
    pub state: String,
    pub capabilities: Vec<String>,
    pub load: u32,
    pub max_concurrent: u32,
    #[serde(default)]
    pub last_heartbeat_ms: u64,
}

/// Detailed worker information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerDetail {
    pub id: String,
    pub state: String,
    pub capabilities: Vec<String>,
    pub load: u32,
    pub max_concurrent: u32,
    pub registered_at_ms: u64,
    pub last_heartbeat_ms: u64,
    #[serde(default)]
    pub assigned_tasks: Vec<String>,
}

impl From<&Worker> for WorkerSummary {
    fn from(w: &Worker) -> Self {
        WorkerSummary {
            id: w.id.to_string(),
            state: w.state.to_string(),
            capabilities: w.capabilities.iter().cloned().collect(),
            load: w.load,
            max_concurrent: w.max_concurrent,
            last_heartbeat_ms: w.last_heartbeat_ms,
        }
    }
}

/// Daemon health summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSummary {
    /// "ok", "degraded", "starting", or "stopping"
    pub status: String,
    pub persistence: PersistenceMode,
    #[serde(default)]
    pub uptime_secs: u64,
    pub worker_count: usize,
    pub queued_tasks: usize,
    pub in_flight_tasks: usize,
}

/// Metrics summary for the metrics query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    #[serde(flatten)]
    pub ops: MetricsSnapshot,
    /// Count per task terminal state
    pub tasks_by_terminal_state: BTreeMap<String, usize>,
    /// Count per worker lifecycle state
    pub workers_by_state: BTreeMap<String, usize>,
    pub queue_depth: usize,
    pub dropped_events: u64,
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Maximum message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default IPC timeout
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encode a message to JSON bytes (without length prefix)
///
/// Use with `write_message()` which handles the length-prefix wire format.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;

    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok(json)
}

/// Decode a message from wire format
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read a length-prefixed message from an async reader
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    // Read length prefix
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    // Read payload
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write a length-prefixed message to an async writer
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a request with timeout
pub async fn read_request<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Write a response with timeout
pub async fn write_response<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
