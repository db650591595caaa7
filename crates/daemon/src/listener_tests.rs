// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn ping_pongs() {
    let dir = tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let response = handle_request(Request::Ping, &ctx).unwrap();
    assert_eq!(response, Response::Pong);
}

#[test]
fn hello_reports_daemon_version() {
    let dir = tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let response = handle_request(
        Request::Hello {
            version: "0.0.1".to_string(),
        },
        &ctx,
    )
    .unwrap();
    assert_eq!(
        response,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn shutdown_flips_phase_and_notifies() {
    let dir = tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let notified = {
        let shutdown = Arc::clone(&ctx.shutdown);
        tokio::spawn(async move { shutdown.notified().await })
    };

    let response = handle_request(Request::Shutdown, &ctx).unwrap();
    assert_eq!(response, Response::ShuttingDown);
    assert_eq!(*ctx.phase.lock(), Phase::Stopping);
    notified.await.unwrap();
}

#[test]
fn end_to_end_register_submit_report_through_requests() {
    let dir = tempdir().unwrap();
    let ctx = test_ctx(dir.path());

    let Response::Registered { worker_id, .. } = handle_request(
        Request::RegisterWorker {
            capabilities: vec!["development".to_string()],
            max_concurrent: 2,
        },
        &ctx,
    )
    .unwrap() else {
        panic!("expected Registered");
    };
    // Apply the emitted registration the way the engine loop would
    apply_bus_backlog(&ctx);

    let Response::Submitted { task_id, .. } = handle_request(
        Request::Submit {
            description: "fix the login bug".to_string(),
            declared_type: None,
            priority: None,
            ttl_ms: None,
            max_retries: None,
        },
        &ctx,
    )
    .unwrap() else {
        panic!("expected Submitted");
    };
    apply_bus_backlog(&ctx);

    // The dispatch loop assigned the task during event processing
    {
        let state = ctx.state.lock();
        let task = state.get_task(&task_id).unwrap();
        assert_eq!(task.worker_id.as_ref().map(|w| w.as_str()), Some(worker_id.as_str()));
    }

    let response = handle_request(
        Request::Report {
            worker_id: worker_id.clone(),
            task_id: task_id.clone(),
            outcome: crate::protocol::ReportOutcome::Success,
            detail: None,
        },
        &ctx,
    )
    .unwrap();
    assert_eq!(response, Response::Ok);
    apply_bus_backlog(&ctx);

    let state = ctx.state.lock();
    assert_eq!(state.get_task(&task_id).unwrap().state.to_string(), "completed");
    assert_eq!(state.get_worker(&worker_id).unwrap().load, 0);
    state.check_invariants().unwrap();
}

/// Drive buffered bus events through apply + handle, like the engine loop.
fn apply_bus_backlog(ctx: &ListenCtx) {
    loop {
        let pending = ctx.event_bus.with_wal(|wal| {
            let mut events = Vec::new();
            while let Some(entry) = wal.next_unprocessed().unwrap() {
                wal.mark_processed(entry.seq);
                events.push(entry.event);
            }
            events
        });
        let Some(pending) = pending else { return };
        if pending.is_empty() {
            return;
        }
        for event in pending {
            ctx.state.lock().apply_event(&event);
            for result in ctx.runtime.handle_event(&event).unwrap() {
                ctx.event_bus.send(result).unwrap();
            }
        }
    }
}
