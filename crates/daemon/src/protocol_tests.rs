// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn request_roundtrip() {
    let request = Request::Submit {
        description: "fix the login bug".to_string(),
        declared_type: Some("bugfix".to_string()),
        priority: Some(Priority::P1),
        ttl_ms: None,
        max_retries: None,
    };
    let bytes = encode(&request).unwrap();
    let decoded: Request = decode(&bytes).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn request_tag_names_are_stable() {
    let json = serde_json::to_value(Request::RegisterWorker {
        capabilities: vec!["development".to_string()],
        max_concurrent: 2,
    })
    .unwrap();
    assert_eq!(json["type"], "RegisterWorker");

    let json = serde_json::to_value(Request::Query {
        query: Query::Health,
    })
    .unwrap();
    assert_eq!(json["query"]["type"], "Health");
}

#[yare::parameterized(
    health  = { Query::Health, "Health" },
    metrics = { Query::Metrics, "Metrics" },
    workers = { Query::ListWorkers, "ListWorkers" },
)]
fn query_tags_are_stable(query: Query, tag: &str) {
    let json = serde_json::to_value(Request::Query { query }).unwrap();
    assert_eq!(json["query"]["type"], tag);
}

#[test]
fn optional_submit_fields_default() {
    let request: Request =
        serde_json::from_str(r#"{"type": "Submit", "description": "do a thing"}"#).unwrap();
    assert_eq!(
        request,
        Request::Submit {
            description: "do a thing".to_string(),
            declared_type: None,
            priority: None,
            ttl_ms: None,
            max_retries: None,
        }
    );
}

#[test]
fn response_roundtrip_with_scores() {
    let response = Response::Submitted {
        task_id: "task-1".to_string(),
        status: "admitted".to_string(),
        category: "development".to_string(),
        scores: [("development".to_string(), 0.5)].into_iter().collect(),
        flagged: false,
    };
    let bytes = encode(&response).unwrap();
    let decoded: Response = decode(&bytes).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn rejection_response_shape() {
    let response = Response::Rejected {
        rejected: true,
        task_id: "task-1".to_string(),
        reason: "prompt-injection".to_string(),
        threats: vec!["instruction-override".to_string()],
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["rejected"], true);
    assert_eq!(json["reason"], "prompt-injection");
}

#[test]
fn metrics_summary_flattens_ops() {
    let response = Response::Metrics {
        metrics: MetricsSummary {
            ops: MetricsSnapshot {
                ops_total: 10,
                rejected_total: 1,
                ops_per_sec: 0.5,
                avg_latency_ms: 1.25,
            },
            tasks_by_terminal_state: Default::default(),
            workers_by_state: Default::default(),
            queue_depth: 0,
            dropped_events: 0,
        },
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["metrics"]["ops_total"], 10);
    assert_eq!(json["metrics"]["queue_depth"], 0);
}

#[tokio::test]
async fn message_framing_roundtrip() {
    let (client, server) = tokio::io::duplex(1024);
    let (mut server_read, _server_write) = tokio::io::split(server);
    let (_client_read, mut client_write) = tokio::io::split(client);

    let data = encode(&Request::Ping).unwrap();
    write_message(&mut client_write, &data).await.unwrap();

    let received = read_message(&mut server_read).await.unwrap();
    let request: Request = decode(&received).unwrap();
    assert_eq!(request, Request::Ping);
}

#[tokio::test]
async fn closed_connection_is_reported() {
    let (client, server) = tokio::io::duplex(64);
    drop(client);
    let (mut server_read, _) = tokio::io::split(server);
    let result = read_message(&mut server_read).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[test]
fn oversized_message_is_refused() {
    let result = write_oversized();
    assert!(matches!(
        result,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

fn write_oversized() -> Result<Vec<u8>, ProtocolError> {
    let description = "x".repeat(MAX_MESSAGE_SIZE + 1);
    encode(&Request::Submit {
        description,
        declared_type: None,
        priority: None,
        ttl_ms: None,
        max_retries: None,
    })
}
