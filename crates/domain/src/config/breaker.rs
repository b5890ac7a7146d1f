use serde::{Deserialize, Serialize};

/// Circuit breaker tuning. See §4.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: usize,
    #[serde(default = "d_open_timeout_secs")]
    pub open_timeout_secs: u64,
    #[serde(default = "d_success_threshold")]
    pub success_threshold: usize,
    #[serde(default = "d_half_open_max")]
    pub half_open_max: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            open_timeout_secs: d_open_timeout_secs(),
            success_threshold: d_success_threshold(),
            half_open_max: d_half_open_max(),
        }
    }
}

fn d_failure_threshold() -> usize {
    5
}
fn d_open_timeout_secs() -> u64 {
    30
}
fn d_success_threshold() -> usize {
    2
}
fn d_half_open_max() -> usize {
    3
}
