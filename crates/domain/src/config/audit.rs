use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Block the producer briefly, then drop the oldest queued events.
    BlockThenDropOldest,
}

/// Audit pipeline tuning: queue capacity, batching, and the backpressure
/// policy applied when the queue is full. See §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    #[serde(default = "d_batch_max_age_ms")]
    pub batch_max_age_ms: u64,
    #[serde(default = "d_drop_policy")]
    pub drop_policy: DropPolicy,
    #[serde(default = "d_block_bound_ms")]
    pub block_bound_ms: u64,
    #[serde(default = "d_local_fallback_path")]
    pub local_fallback_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: d_queue_capacity(),
            batch_size: d_batch_size(),
            batch_max_age_ms: d_batch_max_age_ms(),
            drop_policy: d_drop_policy(),
            block_bound_ms: d_block_bound_ms(),
            local_fallback_path: d_local_fallback_path(),
        }
    }
}

fn d_queue_capacity() -> usize {
    10_000
}
fn d_batch_size() -> usize {
    200
}
fn d_batch_max_age_ms() -> u64 {
    1_000
}
fn d_drop_policy() -> DropPolicy {
    DropPolicy::BlockThenDropOldest
}
fn d_block_bound_ms() -> u64 {
    50
}
fn d_local_fallback_path() -> String {
    "./data/audit-fallback.jsonl".into()
}
