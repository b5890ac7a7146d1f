//! Bounded, multi-producer single-consumer event queue with an explicit
//! drop-oldest backpressure policy. `tokio::sync::mpsc` cannot express
//! "evict the oldest queued item" (only the consumer sees the front of the
//! channel), so the queue is a plain `VecDeque` behind a lock plus two
//! `Notify`s: one wakes the consumer on push, the other wakes a blocked
//! producer when space frees up.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use aegis_domain::entities::AuditEvent;

use crate::metrics::AuditMetrics;

pub struct AuditQueue {
    state: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    block_bound: Duration,
    notify_push: Notify,
    notify_space: Notify,
    metrics: AuditMetrics,
}

impl AuditQueue {
    pub fn new(capacity: usize, block_bound: Duration) -> Self {
        Self {
            state: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            block_bound,
            notify_push: Notify::new(),
            notify_space: Notify::new(),
            metrics: AuditMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &AuditMetrics {
        &self.metrics
    }

    /// Enqueues `event`. Blocks up to `block_bound` waiting for space; if
    /// none frees up in time, evicts the oldest queued event and enqueues
    /// `event` in its place, recording the drop.
    pub async fn publish(&self, event: AuditEvent) {
        let deadline = tokio::time::Instant::now() + self.block_bound;
        loop {
            {
                let mut queue = self.state.lock().await;
                if queue.len() < self.capacity {
                    queue.push_back(event);
                    drop(queue);
                    self.notify_push.notify_one();
                    return;
                }
            }

            if tokio::time::timeout_at(deadline, self.notify_space.notified())
                .await
                .is_err()
            {
                let mut queue = self.state.lock().await;
                if queue.len() >= self.capacity {
                    queue.pop_front();
                    self.metrics.record_dropped();
                }
                queue.push_back(event);
                drop(queue);
                self.notify_push.notify_one();
                return;
            }
        }
    }

    /// Waits until at least one event is queued, then drains up to `max`.
    pub async fn drain_at_least_one(&self, max: usize) -> Vec<AuditEvent> {
        loop {
            let batch = self.drain_up_to(max).await;
            if !batch.is_empty() {
                return batch;
            }
            self.notify_push.notified().await;
        }
    }

    pub async fn drain_up_to(&self, max: usize) -> Vec<AuditEvent> {
        let mut queue = self.state.lock().await;
        let n = max.min(queue.len());
        let batch: Vec<AuditEvent> = queue.drain(..n).collect();
        if n > 0 {
            drop(queue);
            self.notify_space.notify_waiters();
        }
        batch
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }
}
