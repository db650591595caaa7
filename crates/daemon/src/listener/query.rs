// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only query handlers.

use std::collections::BTreeMap;

use cortex_core::{Clock, SystemClock};

use super::ListenCtx;
use crate::protocol::{
    HealthSummary, MetricsSummary, Query, Response, TaskDetail, TaskSummary, WorkerDetail,
    WorkerSummary,
};

/// Handle a query against a consistent snapshot of state.
pub(crate) fn handle_query(ctx: &ListenCtx, query: Query) -> Response {
    match query {
        Query::Health => handle_health(ctx),
        Query::Metrics => handle_metrics(ctx),
        Query::GetTask { id } => {
            let state = ctx.state.lock();
            Response::Task {
                task: state.get_task(&id).map(|t| Box::new(TaskDetail::from(t))),
            }
        }
        Query::GetWorker { id } => {
            let state = ctx.state.lock();
            let worker = state.get_worker(&id).map(|w| {
                Box::new(WorkerDetail {
                    id: w.id.to_string(),
                    state: w.state.to_string(),
                    capabilities: w.capabilities.iter().cloned().collect(),
                    load: w.load,
                    max_concurrent: w.max_concurrent,
                    registered_at_ms: w.registered_at_ms,
                    last_heartbeat_ms: w.last_heartbeat_ms,
                    assigned_tasks: state
                        .tasks_of_worker(&w.id)
                        .iter()
                        .map(|t| t.to_string())
                        .collect(),
                })
            });
            Response::Worker { worker }
        }
        Query::ListTasks { state: by_state, category } => {
            let state = ctx.state.lock();
            let tasks = state
                .tasks
                .values()
                .filter(|t| {
                    by_state
                        .as_deref()
                        .map(|s| t.state.to_string() == s)
                        .unwrap_or(true)
                })
                .filter(|t| {
                    category
                        .as_deref()
                        .map(|c| t.category == c)
                        .unwrap_or(true)
                })
                .map(TaskSummary::from)
                .collect();
            Response::Tasks { tasks }
        }
        Query::ListWorkers => {
            let state = ctx.state.lock();
            Response::Workers {
                workers: state.workers.values().map(WorkerSummary::from).collect(),
            }
        }
    }
}

fn handle_health(ctx: &ListenCtx) -> Response {
    let phase = *ctx.phase.lock();
    let state = ctx.state.lock();
    Response::Health {
        health: HealthSummary {
            status: phase.as_str().to_string(),
            persistence: ctx.persistence_mode,
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            worker_count: state.workers.len(),
            queued_tasks: state.queue.len(),
            in_flight_tasks: state.in_flight_count(),
        },
    }
}

fn handle_metrics(ctx: &ListenCtx) -> Response {
    let ops = ctx.runtime.metrics().snapshot(SystemClock.epoch_ms());

    let state = ctx.state.lock();
    let mut tasks_by_terminal_state: BTreeMap<String, usize> = BTreeMap::new();
    for task in state.tasks.values().filter(|t| t.is_terminal()) {
        *tasks_by_terminal_state
            .entry(task.state.to_string())
            .or_default() += 1;
    }
    let mut workers_by_state: BTreeMap<String, usize> = BTreeMap::new();
    for worker in state.workers.values() {
        *workers_by_state.entry(worker.state.to_string()).or_default() += 1;
    }

    Response::Metrics {
        metrics: MetricsSummary {
            ops,
            tasks_by_terminal_state,
            workers_by_state,
            queue_depth: state.queue.len(),
            dropped_events: ctx.hub.dropped_total(),
        },
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
