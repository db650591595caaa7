// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation metrics: counters plus rolling per-second windows.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Width of the rolling window in seconds.
const WINDOW_SECS: usize = 60;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    /// Epoch second this slot currently represents.
    sec: u64,
    count: u64,
    latency_total_us: u64,
}

/// Operation metrics collector. Cheap to record into from request handlers;
/// snapshots are taken for the metrics query.
#[derive(Debug)]
pub struct Metrics {
    ops_total: AtomicU64,
    rejected_total: AtomicU64,
    window: Mutex<Vec<Slot>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            ops_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            window: Mutex::new(vec![Slot::default(); WINDOW_SECS]),
        }
    }
}

/// Point-in-time view of the rolling counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub ops_total: u64,
    pub rejected_total: u64,
    /// Operations per second averaged over the rolling window.
    pub ops_per_sec: f64,
    /// Mean request latency over the rolling window, in milliseconds.
    pub avg_latency_ms: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed operation and its latency.
    pub fn record_op(&self, now_ms: u64, latency: Duration) {
        self.ops_total.fetch_add(1, Ordering::Relaxed);

        let sec = now_ms / 1_000;
        let mut window = self.window.lock();
        let slot = &mut window[(sec as usize) % WINDOW_SECS];
        if slot.sec != sec {
            // Slot is stale; it now represents the current second
            *slot = Slot {
                sec,
                count: 0,
                latency_total_us: 0,
            };
        }
        slot.count += 1;
        slot.latency_total_us += latency.as_micros() as u64;
    }

    /// Record one rejected submission.
    pub fn record_rejection(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the rolling window as of `now_ms`.
    pub fn snapshot(&self, now_ms: u64) -> MetricsSnapshot {
        let sec = now_ms / 1_000;
        let window = self.window.lock();

        let mut count = 0u64;
        let mut latency_total_us = 0u64;
        for slot in window.iter() {
            // Only slots from the last WINDOW_SECS seconds are live
            if slot.sec + WINDOW_SECS as u64 > sec {
                count += slot.count;
                latency_total_us += slot.latency_total_us;
            }
        }

        MetricsSnapshot {
            ops_total: self.ops_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            ops_per_sec: count as f64 / WINDOW_SECS as f64,
            avg_latency_ms: if count == 0 {
                0.0
            } else {
                latency_total_us as f64 / count as f64 / 1_000.0
            },
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
