//! One circuit breaker per adapter resource, created lazily on first use
//! and shared across every invocation of that resource. The policy engine
//! gets its own breaker inside `aegis-authz`; this pool is strictly for
//! adapter calls.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use aegis_domain::config::BreakerConfig as DomainBreakerConfig;
use aegis_resilience::{BreakerConfig, CircuitBreaker};

pub struct ResourceGuardPool {
    breaker_config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ResourceGuardPool {
    pub fn new(config: &DomainBreakerConfig) -> Self {
        Self {
            breaker_config: BreakerConfig {
                failure_threshold: config.failure_threshold,
                open_duration: std::time::Duration::from_secs(config.open_timeout_secs),
                half_open_probes: config.half_open_max,
                success_threshold: config.success_threshold,
            },
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn breaker_for(&self, resource_key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(resource_key) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write();
        breakers
            .entry(resource_key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config)))
            .clone()
    }

    pub fn snapshot(&self) -> Vec<(String, aegis_resilience::BreakerState)> {
        self.breakers
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.state()))
            .collect()
    }
}
