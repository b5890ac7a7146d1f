//! Non-blocking audit pipeline: producers publish onto a bounded queue, a
//! batching consumer drains it into an append-only sink with indefinite
//! retry and a local-fallback tee on sustained failure.

mod metrics;
mod pipeline;
mod queue;
mod sink;

pub use metrics::AuditMetricsSnapshot;
pub use pipeline::{AuditHandle, AuditPipeline};
pub use sink::{AuditSink, JsonlSink};
