use serde::{Deserialize, Serialize};

/// Retry tuning: exponential backoff with a multiplier of 2 and ±25% jitter,
/// bounded by both attempt count and total deadline. See §4.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "d_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "d_jitter_fraction")]
    pub jitter_fraction: f64,
    #[serde(default = "d_total_deadline_ms")]
    pub total_deadline_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            base_delay_ms: d_base_delay_ms(),
            max_delay_ms: d_max_delay_ms(),
            jitter_fraction: d_jitter_fraction(),
            total_deadline_ms: d_total_deadline_ms(),
        }
    }
}

fn d_max_attempts() -> usize {
    3
}
fn d_base_delay_ms() -> u64 {
    200
}
fn d_max_delay_ms() -> u64 {
    5_000
}
fn d_jitter_fraction() -> f64 {
    0.25
}
fn d_total_deadline_ms() -> u64 {
    15_000
}
