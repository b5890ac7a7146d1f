use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct AuditMetrics {
    dropped: AtomicU64,
    written: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AuditMetricsSnapshot {
    pub dropped: u64,
    pub written: u64,
    pub retries: u64,
}

impl AuditMetrics {
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, count: usize) {
        self.written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AuditMetricsSnapshot {
        AuditMetricsSnapshot {
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
