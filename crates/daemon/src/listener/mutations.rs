// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation request handlers: validate against current state, emit events,
//! and marshal runtime results into responses.

use std::collections::BTreeMap;

use cortex_core::{BeatStatus, Event};
use cortex_engine::{AdmitOutcome, RuntimeError, SubmitRequest};
use tracing::error;

use super::{ConnectionError, ListenCtx};
use crate::event_bus::EventBus;
use crate::lifecycle::Phase;
use crate::protocol::{AssignmentNote, ReportOutcome, Response};

/// Emit an event onto the bus.
pub(crate) fn emit(event_bus: &EventBus, event: Event) -> Result<(), ConnectionError> {
    event_bus.send(event).map_err(|e| {
        error!("Failed to emit event: {}", e);
        ConnectionError::WalError
    })?;
    Ok(())
}

fn error_response(e: RuntimeError) -> Response {
    Response::Error {
        kind: e.kind().to_string(),
        message: e.to_string(),
    }
}

pub(crate) fn handle_submit(
    ctx: &ListenCtx,
    req: SubmitRequest,
) -> Result<Response, ConnectionError> {
    // Degraded mode refuses admissions but keeps serving queries
    let phase = *ctx.phase.lock();
    if phase != Phase::Ok {
        return Ok(Response::Error {
            kind: "admissions-refused".to_string(),
            message: format!("daemon is {}", phase.as_str()),
        });
    }

    match ctx.runtime.admit(req) {
        Ok(AdmitOutcome::Admitted {
            task_id,
            category,
            scores,
            flagged,
            event,
        }) => {
            emit(&ctx.event_bus, event)?;
            Ok(Response::Submitted {
                task_id: task_id.to_string(),
                status: "admitted".to_string(),
                category,
                scores,
                flagged,
            })
        }
        Ok(AdmitOutcome::Rejected {
            task_id,
            reason,
            threats,
            event,
        }) => {
            emit(&ctx.event_bus, event)?;
            Ok(Response::Rejected {
                rejected: true,
                task_id: task_id.to_string(),
                reason,
                threats,
            })
        }
        Err(e) => Ok(error_response(e)),
    }
}

pub(crate) fn handle_register(
    ctx: &ListenCtx,
    capabilities: Vec<String>,
    max_concurrent: u32,
) -> Result<Response, ConnectionError> {
    match ctx.runtime.register(capabilities, max_concurrent) {
        Ok((worker_id, event)) => {
            emit(&ctx.event_bus, event)?;
            Ok(Response::Registered {
                worker_id: worker_id.to_string(),
                heartbeat_interval_ms: ctx.runtime.config().heartbeat_check_interval_ms,
            })
        }
        Err(e) => Ok(error_response(e)),
    }
}

pub(crate) fn handle_unregister(
    ctx: &ListenCtx,
    worker_id: &str,
) -> Result<Response, ConnectionError> {
    match ctx.runtime.unregister(worker_id) {
        Ok((outstanding, event)) => {
            let worker_id = match &event {
                Event::WorkerUnregistered { worker_id } | Event::WorkerDraining { worker_id, .. } => {
                    worker_id.to_string()
                }
                _ => worker_id.to_string(),
            };
            emit(&ctx.event_bus, event)?;
            Ok(Response::Unregistering {
                worker_id,
                outstanding: outstanding.iter().map(|t| t.to_string()).collect(),
            })
        }
        Err(e) => Ok(error_response(e)),
    }
}

pub(crate) fn handle_heartbeat(
    ctx: &ListenCtx,
    worker_id: &str,
    status: BeatStatus,
    progress: BTreeMap<String, u8>,
) -> Result<Response, ConnectionError> {
    match ctx.runtime.heartbeat(worker_id, status, progress) {
        Ok((ack, event)) => {
            emit(&ctx.event_bus, event)?;
            // Marshal assignments with enough context for the worker to act
            let assignments = {
                let state = ctx.state.lock();
                ack.assignments
                    .iter()
                    .filter_map(|task_id| state.tasks.get(task_id.as_str()))
                    .map(|task| AssignmentNote {
                        task_id: task.id.to_string(),
                        description: task.description.clone(),
                        category: task.category.clone(),
                        priority: task.priority,
                    })
                    .collect()
            };
            Ok(Response::HeartbeatAck {
                state: ack.state.to_string(),
                assignments,
            })
        }
        Err(e) => Ok(error_response(e)),
    }
}

pub(crate) fn handle_report(
    ctx: &ListenCtx,
    worker_id: &str,
    task_id: &str,
    outcome: ReportOutcome,
    detail: Option<String>,
) -> Result<Response, ConnectionError> {
    let success = outcome == ReportOutcome::Success;
    match ctx.runtime.report(worker_id, task_id, success, detail) {
        Ok(event) => {
            emit(&ctx.event_bus, event)?;
            Ok(Response::Ok)
        }
        Err(e) => Ok(error_response(e)),
    }
}

pub(crate) fn handle_cancel(ctx: &ListenCtx, task_id: &str) -> Result<Response, ConnectionError> {
    match ctx.runtime.cancel(task_id) {
        Ok((pending, event)) => {
            let task_id = match &event {
                Event::TaskCancelRequested { task_id, .. } => task_id.to_string(),
                _ => task_id.to_string(),
            };
            emit(&ctx.event_bus, event)?;
            Ok(Response::Cancelled { task_id, pending })
        }
        Err(e) => Ok(error_response(e)),
    }
}

#[cfg(test)]
#[path = "mutations_tests.rs"]
mod tests;
