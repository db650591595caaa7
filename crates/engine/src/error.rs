// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime.
//!
//! Every variant has a stable machine-readable kind so the request surface
//! can marshal errors into structured responses.

use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("worker not found: {0}")]
    WorkerNotFound(String),
    #[error("worker already registered: {0}")]
    DuplicateWorker(String),
    #[error("worker timed out and must re-register: {0}")]
    WorkerExpired(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("task not assigned to reporting worker: {0}")]
    TaskNotAssigned(String),
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("queue full: {0} tasks queued")]
    QueueFull(usize),
    #[error("admissions refused: {0}")]
    AdmissionsRefused(String),
}

impl RuntimeError {
    /// Stable machine-readable kind for wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::WorkerNotFound(_) => "worker-not-found",
            RuntimeError::DuplicateWorker(_) => "worker-already-exists",
            RuntimeError::WorkerExpired(_) => "worker-expired",
            RuntimeError::TaskNotFound(_) => "task-not-found",
            RuntimeError::TaskNotAssigned(_) => "task-not-assigned",
            RuntimeError::StateConflict(_) => "state-conflict",
            RuntimeError::QueueFull(_) => "queue-full",
            RuntimeError::AdmissionsRefused(_) => "admissions-refused",
        }
    }
}
