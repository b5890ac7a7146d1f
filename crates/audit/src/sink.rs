//! The write boundary the audit pipeline drains batches into. A time-series
//! or SIEM sink lives outside this crate; the JSONL sink here is both the
//! default implementation and the durable local fallback used when such a
//! sink is unreachable.

use async_trait::async_trait;

use aegis_domain::entities::AuditEvent;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write_batch(&self, events: &[AuditEvent]) -> std::io::Result<()>;
}

/// Appends one JSON object per line. Opens, writes, and flushes per batch;
/// never holds the file open between batches, since the pipeline runs at
/// most one consumer.
pub struct JsonlSink {
    path: std::path::PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSink for JsonlSink {
    async fn write_batch(&self, events: &[AuditEvent]) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut buf = String::new();
        for event in events {
            let line = serde_json::to_string(event).unwrap_or_default();
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await
    }
}
