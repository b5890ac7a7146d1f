use serde::{Deserialize, Serialize};

/// Policy decision cache tuning. See §4.2: bounded capacity, TTL clamps,
/// and the shorter bound applied to negative (deny) decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_capacity")]
    pub capacity: usize,
    #[serde(default = "d_default_ttl")]
    pub default_ttl_secs: u64,
    #[serde(default = "d_max_ttl")]
    pub max_ttl_secs: u64,
    #[serde(default = "d_deny_ttl_max")]
    pub deny_ttl_max_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: d_capacity(),
            default_ttl_secs: d_default_ttl(),
            max_ttl_secs: d_max_ttl(),
            deny_ttl_max_secs: d_deny_ttl_max(),
        }
    }
}

impl CacheConfig {
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn max_ttl(&self) -> u64 {
        self.max_ttl_secs
    }
    pub fn deny_ttl_max(&self) -> u64 {
        self.deny_ttl_max_secs
    }
}

fn d_capacity() -> usize {
    10_000
}
fn d_default_ttl() -> u64 {
    300
}
fn d_max_ttl() -> u64 {
    3600
}
fn d_deny_ttl_max() -> u64 {
    60
}
