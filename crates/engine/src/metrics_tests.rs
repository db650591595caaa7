// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn counts_operations() {
    let metrics = Metrics::new();
    metrics.record_op(10_000, Duration::from_millis(2));
    metrics.record_op(10_500, Duration::from_millis(4));

    let snapshot = metrics.snapshot(11_000);
    assert_eq!(snapshot.ops_total, 2);
    assert_eq!(snapshot.avg_latency_ms, 3.0);
}

#[test]
fn rejections_are_counted_separately() {
    let metrics = Metrics::new();
    metrics.record_rejection();
    metrics.record_rejection();
    assert_eq!(metrics.snapshot(0).rejected_total, 2);
}

#[test]
fn rolling_window_forgets_old_seconds() {
    let metrics = Metrics::new();
    metrics.record_op(10_000, Duration::from_millis(5));

    // Two minutes later the window slot is stale
    let snapshot = metrics.snapshot(130_000);
    assert_eq!(snapshot.ops_total, 1);
    assert_eq!(snapshot.ops_per_sec, 0.0);
    assert_eq!(snapshot.avg_latency_ms, 0.0);
}

#[test]
fn ops_per_sec_averages_over_window() {
    let metrics = Metrics::new();
    for i in 0..120 {
        metrics.record_op(1_000_000 + i * 500, Duration::from_millis(1));
    }
    // 120 ops over 60 seconds of wall time, all within the window
    let snapshot = metrics.snapshot(1_059_999);
    assert_eq!(snapshot.ops_per_sec, 2.0);
}

#[test]
fn empty_window_reports_zero_latency() {
    let metrics = Metrics::new();
    let snapshot = metrics.snapshot(5_000);
    assert_eq!(snapshot.ops_per_sec, 0.0);
    assert_eq!(snapshot.avg_latency_ms, 0.0);
}
