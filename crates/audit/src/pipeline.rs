//! Wires the bounded queue to a batching consumer that writes to the
//! configured sink, retrying indefinitely with backoff and teeing to a
//! local JSONL fallback once failures persist.

use std::sync::Arc;
use std::time::Duration;

use aegis_domain::config::AuditConfig;
use aegis_domain::entities::AuditEvent;
use aegis_resilience::backoff::{delay_for_attempt, BackoffConfig};

use crate::metrics::AuditMetricsSnapshot;
use crate::queue::AuditQueue;
use crate::sink::{AuditSink, JsonlSink};

/// Consecutive batch-write failures before events are also teed to the
/// local fallback sink.
const FALLBACK_AFTER_CONSECUTIVE_FAILURES: u32 = 3;

/// The producer-facing half of the pipeline. Cheap to clone; every clone
/// publishes onto the same bounded queue.
#[derive(Clone)]
pub struct AuditHandle {
    queue: Arc<AuditQueue>,
}

impl AuditHandle {
    /// Never blocks longer than the configured `block_bound`; beyond that
    /// the oldest queued event is dropped to make room.
    pub async fn publish(&self, event: AuditEvent) {
        self.queue.publish(event).await;
    }

    pub fn metrics(&self) -> AuditMetricsSnapshot {
        self.queue.metrics().snapshot()
    }
}

pub struct AuditPipeline;

impl AuditPipeline {
    /// Spawns the batching consumer task and returns a handle producers can
    /// clone freely. The consumer runs until the returned `JoinHandle` is
    /// aborted or the process exits.
    pub fn spawn(config: AuditConfig, sink: Arc<dyn AuditSink>) -> (AuditHandle, tokio::task::JoinHandle<()>) {
        let queue = Arc::new(AuditQueue::new(config.queue_capacity, Duration::from_millis(config.block_bound_ms)));
        let fallback = Arc::new(JsonlSink::new(config.local_fallback_path.clone()));

        let consumer_queue = queue.clone();
        let batch_size = config.batch_size;
        let batch_max_age = Duration::from_millis(config.batch_max_age_ms);

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(batch_max_age);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    batch = consumer_queue.drain_at_least_one(batch_size) => {
                        write_with_retry(&consumer_queue, &sink, &fallback, batch).await;
                    }
                    _ = interval.tick() => {
                        let batch = consumer_queue.drain_up_to(batch_size).await;
                        if !batch.is_empty() {
                            write_with_retry(&consumer_queue, &sink, &fallback, batch).await;
                        }
                    }
                }
            }
        });

        (AuditHandle { queue }, join)
    }
}

async fn write_with_retry(queue: &AuditQueue, sink: &Arc<dyn AuditSink>, fallback: &Arc<JsonlSink>, batch: Vec<AuditEvent>) {
    let backoff = BackoffConfig::default();
    let mut consecutive_failures = 0u32;
    loop {
        match sink.write_batch(&batch).await {
            Ok(()) => {
                queue.metrics().record_written(batch.len());
                return;
            }
            Err(e) => {
                consecutive_failures += 1;
                queue.metrics().record_retry();
                tracing::warn!(error = %e, attempt = consecutive_failures, "audit sink write failed, retrying");

                if consecutive_failures >= FALLBACK_AFTER_CONSECUTIVE_FAILURES {
                    if let Err(fallback_err) = fallback.write_batch(&batch).await {
                        tracing::error!(error = %fallback_err, "audit local fallback write also failed");
                    } else {
                        tracing::warn!("audit events teed to local fallback after sustained sink failure");
                    }
                }

                let delay = delay_for_attempt(&backoff, (consecutive_failures - 1).min(20));
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::{AuditEventKind, AuditOutcome, Protocol};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl AuditSink for CountingSink {
        async fn write_batch(&self, _events: &[AuditEvent]) -> std::io::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first_n {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "sink down"))
            } else {
                Ok(())
            }
        }
    }

    fn sample() -> AuditEvent {
        AuditEvent {
            id: 1,
            kind: AuditEventKind::Invocation,
            principal_id: "alice".into(),
            source_ip: "127.0.0.1".into(),
            target_protocol: Protocol::Http,
            target_server: "fs-1".into(),
            target_capability: "read_file".into(),
            allow: Some(true),
            reason: None,
            outcome: AuditOutcome::Success,
            duration_ms: 1,
            timestamp: chrono::Utc::now(),
            filtered: false,
            context: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn publishes_and_drains_to_sink() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });
        let mut config = AuditConfig::default();
        config.batch_max_age_ms = 20;
        let (handle, join) = AuditPipeline::spawn(config, sink.clone());

        handle.publish(sample()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.metrics().written, 1);
        join.abort();
    }

    #[tokio::test]
    async fn retries_past_transient_sink_failures() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail_first_n: 2,
        });
        let mut config = AuditConfig::default();
        config.batch_max_age_ms = 10;
        let (handle, join) = AuditPipeline::spawn(config, sink.clone());

        handle.publish(sample()).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(handle.metrics().written, 1);
        assert!(handle.metrics().retries >= 2);
        join.abort();
    }
}
