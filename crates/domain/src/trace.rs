use serde::Serialize;

/// Structured lifecycle events emitted across every aegis crate. Each
/// variant is logged as a single `tracing::info!` line carrying the
/// serialized event under the `trace_event` field, so a log pipeline can
/// index on `event` without parsing free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BreakerOpened {
        resource_id: String,
        consecutive_failures: usize,
    },
    BreakerHalfOpen {
        resource_id: String,
    },
    BreakerClosed {
        resource_id: String,
    },
    CacheHit {
        fingerprint: String,
    },
    CacheMiss {
        fingerprint: String,
    },
    CacheSingleFlightSuppressed {
        fingerprint: String,
    },
    CacheEvicted {
        fingerprint: String,
        reason: &'static str,
    },
    CacheInvalidatedAll,
    SubprocessStateChanged {
        resource_id: String,
        from: String,
        to: String,
    },
    SubprocessHung {
        resource_id: String,
        idle_ms: u64,
    },
    SubprocessRestarted {
        resource_id: String,
        attempt: u32,
    },
    SubprocessResourceLimitBreached {
        resource_id: String,
        limit: &'static str,
    },
    AuditDropped {
        dropped: u64,
        total_dropped: u64,
    },
    AuditBatchWritten {
        count: usize,
    },
    AuditSinkRetrying {
        attempt: u32,
        delay_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "aegis_event");
    }
}
