// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push-channel fan-out with per-subscriber bounded buffers.
//!
//! The engine loop publishes every public event exactly once; each
//! subscriber has its own buffer so a slow consumer never blocks the
//! producer or its peers. On overflow the oldest undelivered event is
//! dropped and a single `lost-events` marker takes its place in the
//! stream, carrying the count of everything lost since the last delivered
//! event. Per-subject ordering is preserved because there is one publisher
//! and each buffer is FIFO.

use cortex_core::Event;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct SubscriberBuf {
    /// Event kinds this subscriber wants; empty means all public events.
    kinds: Vec<String>,
    buffer: VecDeque<Event>,
    /// Events dropped since the last delivery; surfaced as one marker.
    pending_lost: u64,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct HubInner {
    subscribers: HashMap<u64, SubscriberBuf>,
    next_id: u64,
}

/// Fan-out hub for push-channel subscribers.
pub struct SubscriberHub {
    inner: Mutex<HubInner>,
    buffer_depth: usize,
    /// Total events dropped across all subscribers, for metrics.
    dropped_total: AtomicU64,
}

impl SubscriberHub {
    pub fn new(buffer_depth: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            buffer_depth: buffer_depth.max(2),
            dropped_total: AtomicU64::new(0),
        }
    }

    /// Register a subscriber, optionally filtered by event kind.
    ///
    /// Subscribers receive events produced after registration only.
    pub fn subscribe(self: &Arc<Self>, kinds: Vec<String>) -> Subscription {
        let notify = Arc::new(Notify::new());
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(
                id,
                SubscriberBuf {
                    kinds,
                    buffer: VecDeque::new(),
                    pending_lost: 0,
                    notify: Arc::clone(&notify),
                },
            );
            id
        };
        Subscription {
            id,
            hub: Arc::clone(self),
            notify,
        }
    }

    /// Fan an event out to all interested subscribers. Never blocks.
    ///
    /// Internal events are not published.
    pub fn publish(&self, event: &Event) {
        if event.is_internal() {
            return;
        }

        let mut inner = self.inner.lock();
        for sub in inner.subscribers.values_mut() {
            if !sub.kinds.is_empty() && !sub.kinds.iter().any(|k| k == event.name()) {
                continue;
            }
            if sub.buffer.len() >= self.buffer_depth {
                // Drop the oldest undelivered event for this subscriber
                if let Some(dropped) = sub.buffer.pop_front() {
                    sub.pending_lost += match dropped {
                        // Collapse an unread marker into the new one
                        Event::LostEvents { dropped } => dropped,
                        _ => 1,
                    };
                    self.dropped_total.fetch_add(1, Ordering::Relaxed);
                }
            }
            sub.buffer.push_back(event.clone());
            sub.notify.notify_one();
        }
    }

    /// Total events dropped across all subscribers.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Pop the next event for a subscriber, marker first if events were
    /// lost since the last delivery.
    fn pop(&self, id: u64) -> Option<Event> {
        let mut inner = self.inner.lock();
        let sub = inner.subscribers.get_mut(&id)?;
        if sub.pending_lost > 0 {
            let dropped = sub.pending_lost;
            sub.pending_lost = 0;
            return Some(Event::LostEvents { dropped });
        }
        sub.buffer.pop_front()
    }

    fn unsubscribe(&self, id: u64) {
        self.inner.lock().subscribers.remove(&id);
    }
}

/// Handle to one subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    hub: Arc<SubscriberHub>,
    notify: Arc<Notify>,
}

impl Subscription {
    /// Receive the next event, waiting if the buffer is empty.
    pub async fn recv(&self) -> Event {
        loop {
            if let Some(event) = self.hub.pop(self.id) {
                return event;
            }
            self.notify.notified().await;
        }
    }

    /// Receive without waiting. Test and drain helper.
    pub fn try_recv(&self) -> Option<Event> {
        self.hub.pop(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
