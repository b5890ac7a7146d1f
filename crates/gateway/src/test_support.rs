//! Shared handler-test fixtures. Builds a fully-wired `AppState` against an
//! unreachable policy engine URL so authorization falls back to the
//! `fail_closed` default rather than making a network call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aegis_adapters::AdapterRegistry;
use aegis_audit::{AuditPipeline, JsonlSink};
use aegis_authz::AuthzService;
use aegis_domain::config::Config;
use aegis_resilience::{BackoffConfig, RetryPolicy, TimeoutPolicy};

use crate::rate_limit::RateLimiter;
use crate::resource_guard::ResourceGuardPool;
use crate::state::AppState;

pub(crate) fn test_state() -> AppState {
    let mut config = Config::default();
    config.policy.engine_url = "http://127.0.0.1:9/unreachable".into();
    config.policy.fail_closed = true;
    let config = Arc::new(config);

    let fallback_sink: Arc<dyn aegis_audit::AuditSink> =
        Arc::new(JsonlSink::new(std::env::temp_dir().join("aegis-gateway-test-audit.jsonl")));
    let (audit_handle, _join) = AuditPipeline::spawn(config.audit.clone(), fallback_sink);

    let authz = Arc::new(AuthzService::new(&config.policy, &config.breaker, &config.retry, &config.cache, None));

    let adapter_retry = Arc::new(
        RetryPolicy::builder()
            .max_attempts(config.retry.max_attempts)
            .backoff(BackoffConfig {
                base: Duration::from_millis(config.retry.base_delay_ms),
                max: Duration::from_millis(config.retry.max_delay_ms),
                jitter_ratio: config.retry.jitter_fraction,
            })
            .retryable_if(aegis_adapters::AdapterError::is_retryable)
            .build(),
    );

    AppState {
        registry: Arc::new(AdapterRegistry::new()),
        authz,
        audit: audit_handle,
        rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
        resource_guards: Arc::new(ResourceGuardPool::new(&config.breaker)),
        adapter_retry,
        adapter_timeout: TimeoutPolicy::new(Duration::from_millis(config.retry.total_deadline_ms)),
        api_token_hash: None,
        admin_token_hash: None,
        started_at: Instant::now(),
        config,
    }
}
