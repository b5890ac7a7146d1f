use serde::{Deserialize, Serialize};

/// Subprocess resource limits and health-loop tuning for the stdio
/// transport. See §4.4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioConfig {
    #[serde(default = "d_max_memory_mb")]
    pub max_memory_mb: u64,
    #[serde(default = "d_max_cpu_percent")]
    pub max_cpu_percent: f32,
    #[serde(default = "d_max_fds")]
    pub max_fds: u64,
    #[serde(default = "d_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "d_hung_timeout_secs")]
    pub hung_timeout_secs: u64,
    #[serde(default = "d_max_restart_attempts")]
    pub max_restart_attempts: u32,
    #[serde(default = "d_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Steady-state duration with no failures after which the restart
    /// counter resets to zero.
    #[serde(default = "d_steady_state_secs")]
    pub steady_state_secs: u64,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: d_max_memory_mb(),
            max_cpu_percent: d_max_cpu_percent(),
            max_fds: d_max_fds(),
            heartbeat_interval_secs: d_heartbeat_interval_secs(),
            hung_timeout_secs: d_hung_timeout_secs(),
            max_restart_attempts: d_max_restart_attempts(),
            stop_timeout_secs: d_stop_timeout_secs(),
            steady_state_secs: d_steady_state_secs(),
        }
    }
}

fn d_max_memory_mb() -> u64 {
    512
}
fn d_max_cpu_percent() -> f32 {
    90.0
}
fn d_max_fds() -> u64 {
    256
}
fn d_heartbeat_interval_secs() -> u64 {
    10
}
fn d_hung_timeout_secs() -> u64 {
    15
}
fn d_max_restart_attempts() -> u32 {
    3
}
fn d_stop_timeout_secs() -> u64 {
    5
}
fn d_steady_state_secs() -> u64 {
    300
}
