use serde::{Deserialize, Serialize};

/// Per-principal token-bucket rate limiting. See §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_rps")]
    pub per_principal_rps: u32,
    #[serde(default = "d_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_principal_rps: d_rps(),
            burst: d_burst(),
        }
    }
}

fn d_rps() -> u32 {
    50
}
fn d_burst() -> u32 {
    100
}
