//! Layered configuration, loaded from TOML with per-field defaults and
//! validated before `serve` proceeds.

mod audit;
mod breaker;
mod cache;
mod observability;
mod rate_limit;
mod retry;
mod server;
mod stdio;

pub use audit::{AuditConfig, DropPolicy};
pub use breaker::BreakerConfig;
pub use cache::CacheConfig;
pub use observability::ObservabilityConfig;
pub use rate_limit::RateLimitConfig;
pub use retry::RetryConfig;
pub use server::{AuthConfig, CorsConfig, ServerConfig};
pub use stdio::StdioConfig;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARNING",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    #[serde(default = "d_policy_url")]
    pub engine_url: String,
    #[serde(default = "d_true")]
    pub fail_closed: bool,
}

fn d_policy_url() -> String {
    "http://127.0.0.1:8181/v1/evaluate".into()
}

fn d_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub stdio: StdioConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to parse config, using defaults");
                    Config::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Returns every validation issue found; an empty vec means the config
    /// is fit to serve. `Error`-severity issues should abort startup;
    /// `Warning`-severity issues should be logged and startup continue.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be nonzero".into(),
            });
        }
        if self.server.host.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.cache.capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "cache.capacity".into(),
                message: "capacity must be > 0".into(),
            });
        }
        if self.cache.deny_ttl_max_secs > self.cache.max_ttl_secs {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "cache.deny_ttl_max".into(),
                message: "deny_ttl_max exceeds max_ttl; clamping will always apply".into(),
            });
        }

        if self.breaker.half_open_max == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "breaker.half_open_max".into(),
                message: "half_open_max must be > 0".into(),
            });
        }

        if self.retry.max_attempts == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "retry.max_attempts".into(),
                message: "max_attempts must be > 0".into(),
            });
        }

        if self.stdio.max_restart_attempts == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "stdio.max_restart_attempts".into(),
                message: "0 means a single crash permanently fails the resource".into(),
            });
        }

        if self.audit.queue_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "audit.queue_capacity".into(),
                message: "queue_capacity must be > 0".into(),
            });
        }
        if self.audit.batch_size == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "audit.batch_size".into(),
                message: "batch_size must be > 0".into(),
            });
        }

        if !self.policy.engine_url.starts_with("http://")
            && !self.policy.engine_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "policy.engine_url".into(),
                message: "must be an http:// or https:// URL".into(),
            });
        }

        if self.rate_limit.per_principal_rps == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "rate_limit.per_principal_rps".into(),
                message: "0 rps blocks every request".into(),
            });
        }

        if self.auth.api_token.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "auth.api_token".into(),
                message: "no API token configured; running in dev mode with auth disabled".into(),
            });
        }

        errors
    }
}
