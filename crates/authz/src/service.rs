//! The authorization service: fingerprints a policy input, consults the
//! decision cache, and falls back to the external policy engine through the
//! resilience stack on a miss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::Sender;

use aegis_domain::config::{BreakerConfig as DomainBreakerConfig, CacheConfig, PolicyConfig, RetryConfig as DomainRetryConfig};
use aegis_domain::entities::{
    AuditEvent, AuditEventKind, AuditOutcome, Decision, Fingerprint, Principal, Target,
};
use aegis_domain::fingerprint::{self, A2aFingerprintInput, FingerprintInput};
use aegis_resilience::{BackoffConfig, BreakerConfig, CircuitBreaker, ResilienceError, RetryPolicy, TimeoutPolicy};
use aegis_policy_cache::PolicyCache;

use crate::engine::PolicyEngineClient;
use crate::error::AuthzError;

fn to_breaker_config(cfg: &DomainBreakerConfig) -> BreakerConfig {
    BreakerConfig {
        failure_threshold: cfg.failure_threshold,
        open_duration: Duration::from_secs(cfg.open_timeout_secs),
        half_open_probes: cfg.half_open_max,
        success_threshold: cfg.success_threshold,
    }
}

fn to_backoff_config(cfg: &DomainRetryConfig) -> BackoffConfig {
    BackoffConfig {
        base: Duration::from_millis(cfg.base_delay_ms),
        max: Duration::from_millis(cfg.max_delay_ms),
        jitter_ratio: cfg.jitter_fraction,
    }
}

pub struct AuthzService {
    engine: PolicyEngineClient,
    cache: PolicyCache,
    breaker: CircuitBreaker,
    retry: RetryPolicy<AuthzError>,
    timeout: TimeoutPolicy,
    fail_closed: bool,
    default_ttl: Duration,
    max_ttl: Duration,
    deny_ttl_max: Duration,
    audit_tx: Option<Sender<AuditEvent>>,
    next_audit_id: AtomicU64,
}

impl AuthzService {
    pub fn new(
        policy: &PolicyConfig,
        breaker: &DomainBreakerConfig,
        retry: &DomainRetryConfig,
        cache: &CacheConfig,
        audit_tx: Option<Sender<AuditEvent>>,
    ) -> Self {
        let retry_policy = RetryPolicy::builder()
            .max_attempts(retry.max_attempts)
            .backoff(to_backoff_config(retry))
            .retryable_if(AuthzError::is_retryable)
            .build();

        Self {
            engine: PolicyEngineClient::new(policy.engine_url.clone(), Duration::from_secs(5)),
            cache: PolicyCache::new(cache.capacity()),
            breaker: CircuitBreaker::new(to_breaker_config(breaker)),
            retry: retry_policy,
            timeout: TimeoutPolicy::new(Duration::from_millis(retry.total_deadline_ms)),
            fail_closed: policy.fail_closed,
            default_ttl: Duration::from_secs(cache.default_ttl_secs),
            max_ttl: Duration::from_secs(cache.max_ttl()),
            deny_ttl_max: Duration::from_secs(cache.deny_ttl_max()),
            audit_tx,
            next_audit_id: AtomicU64::new(1),
        }
    }

    /// Clamps the engine-supplied TTL: allows use the configured default
    /// bound (capped at `max_ttl`); denies use the shorter negative-caching
    /// bound unless the engine flagged the decision as stable. A TTL of
    /// zero means the engine wants this decision evaluated fresh every
    /// time, so it's returned uncached rather than clamped to a default.
    fn ttl_for(&self, decision: &Decision) -> Option<Duration> {
        if decision.cache_ttl_secs == 0 {
            return None;
        }
        let bound = if !decision.allow && !decision.stable {
            self.deny_ttl_max
        } else {
            self.max_ttl
        };
        Some(Duration::from_secs(decision.cache_ttl_secs).min(bound))
    }

    async fn evaluate_with_resilience<F, Fut>(&self, call: F) -> Result<Decision, AuthzError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Decision, AuthzError>>,
    {
        self.breaker.check().map_err(|_| AuthzError::CircuitOpen)?;

        let outcome = self
            .retry
            .run(|| async {
                self.timeout.run(call()).await.map_err(|e| match e {
                    ResilienceError::Timeout { .. } => AuthzError::Timeout,
                    ResilienceError::Inner(inner) => inner,
                    other => AuthzError::Transport(other.to_string()),
                })
            })
            .await;

        match &outcome {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }

        outcome.map_err(|e| match e {
            ResilienceError::RetryExhausted { failures, .. } => {
                failures.into_iter().last().unwrap_or(AuthzError::Timeout)
            }
            ResilienceError::Inner(inner) => inner,
            ResilienceError::Timeout { .. } => AuthzError::Timeout,
            _ => AuthzError::CircuitOpen,
        })
    }

    /// Builds a synthetic response for a policy-engine outage: a deny unless
    /// the operator has explicitly opted into fail-open (discouraged).
    fn outage_decision(&self, err: &AuthzError) -> Decision {
        if self.fail_closed {
            Decision {
                allow: false,
                reason: "policy_unavailable".into(),
                filtered_parameters: None,
                cache_ttl_secs: 0,
                fingerprint: None,
                stable: false,
                reason_sensitive: false,
            }
        } else {
            tracing::warn!(error = %err, "policy engine unavailable, failing open per configuration");
            Decision {
                allow: true,
                reason: "policy_unavailable_fail_open".into(),
                filtered_parameters: None,
                cache_ttl_secs: 0,
                fingerprint: None,
                stable: false,
                reason_sensitive: false,
            }
        }
    }

    pub async fn authorize(&self, principal: &Principal, target: &Target, action: &str) -> Decision {
        let start = std::time::Instant::now();
        let key = fingerprint::fingerprint(FingerprintInput {
            principal_id: &principal.id,
            roles: &principal.roles,
            action,
            protocol: target.protocol,
            server_handle: &target.server_handle,
            capability: &target.capability,
            parameters: &target.parameters,
        });

        let result = self
            .cache
            .get_or_compute(
                key,
                || self.evaluate_with_resilience(|| self.engine.evaluate(principal, target, action)),
                |d| self.ttl_for(d),
            )
            .await;

        let mut decision = match result {
            Ok(decision) => decision,
            Err(err) => self.outage_decision(&err),
        };
        decision.fingerprint = Some(key);

        self.emit_authorization_event(principal, target, &decision, start.elapsed());
        decision
    }

    pub async fn authorize_a2a(&self, source_agent: &str, target_agent: &str, capability: &str) -> Decision {
        let start = std::time::Instant::now();
        let parameters = serde_json::json!({});
        let key = fingerprint::fingerprint_a2a(A2aFingerprintInput {
            source_agent,
            target_agent,
            capability,
            parameters: &parameters,
        });

        let result = self
            .cache
            .get_or_compute(
                key,
                || {
                    self.evaluate_with_resilience(|| {
                        self.engine.evaluate_a2a(source_agent, target_agent, capability, &parameters)
                    })
                },
                |d| self.ttl_for(d),
            )
            .await;

        let mut decision = match result {
            Ok(decision) => decision,
            Err(err) => self.outage_decision(&err),
        };
        decision.fingerprint = Some(key);

        self.emit_a2a_authorization_event(source_agent, target_agent, capability, &decision, start.elapsed());
        decision
    }

    pub fn invalidate_for_policy_change(&self) {
        self.cache.invalidate_all();
    }

    pub fn invalidate(&self, fp: &Fingerprint) {
        self.cache.invalidate(fp);
    }

    pub fn cache_metrics(&self) -> aegis_policy_cache::CacheMetricsSnapshot {
        self.cache.metrics()
    }

    fn emit_authorization_event(&self, principal: &Principal, target: &Target, decision: &Decision, elapsed: Duration) {
        let Some(tx) = &self.audit_tx else { return };
        let event = AuditEvent {
            id: self.next_audit_id.fetch_add(1, Ordering::Relaxed),
            kind: AuditEventKind::Authorization,
            principal_id: principal.id.clone(),
            source_ip: principal.ip.clone(),
            target_protocol: target.protocol,
            target_server: target.server_handle.clone(),
            target_capability: target.capability.clone(),
            allow: Some(decision.allow),
            reason: Some(decision.reason.clone()),
            outcome: if decision.allow {
                AuditOutcome::Success
            } else {
                AuditOutcome::Denied
            },
            duration_ms: elapsed.as_millis() as u64,
            timestamp: chrono::Utc::now(),
            filtered: decision.filtered_parameters.is_some(),
            context: serde_json::Value::Null,
        };
        if let Err(e) = tx.try_send(event) {
            tracing::warn!(error = %e, "authorization audit event dropped, queue full");
        }
    }

    fn emit_a2a_authorization_event(
        &self,
        source_agent: &str,
        target_agent: &str,
        capability: &str,
        decision: &Decision,
        elapsed: Duration,
    ) {
        let Some(tx) = &self.audit_tx else { return };
        let event = AuditEvent {
            id: self.next_audit_id.fetch_add(1, Ordering::Relaxed),
            kind: AuditEventKind::Authorization,
            principal_id: source_agent.to_string(),
            source_ip: String::new(),
            target_protocol: aegis_domain::entities::Protocol::A2a,
            target_server: target_agent.to_string(),
            target_capability: capability.to_string(),
            allow: Some(decision.allow),
            reason: Some(decision.reason.clone()),
            outcome: if decision.allow {
                AuditOutcome::Success
            } else {
                AuditOutcome::Denied
            },
            duration_ms: elapsed.as_millis() as u64,
            timestamp: chrono::Utc::now(),
            filtered: decision.filtered_parameters.is_some(),
            context: serde_json::Value::Null,
        };
        if let Err(e) = tx.try_send(event) {
            tracing::warn!(error = %e, "a2a authorization audit event dropped, queue full");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_principal() -> Principal {
        Principal {
            id: "alice".into(),
            roles: Default::default(),
            teams: Default::default(),
            scopes: Default::default(),
            ip: "127.0.0.1".into(),
            trust_level: "standard".into(),
        }
    }

    fn sample_target() -> Target {
        Target {
            protocol: aegis_domain::entities::Protocol::Http,
            server_handle: "fs-1".into(),
            capability: "read_file".into(),
            sensitivity: aegis_domain::entities::SensitivityTier::Low,
            owning_team: "platform".into(),
            visibility: aegis_domain::entities::Visibility::Internal,
            parameters: serde_json::json!({"path": "/tmp/a"}),
        }
    }

    #[test]
    fn ttl_for_deny_is_clamped_to_deny_bound() {
        let cache = CacheConfig {
            capacity: 10,
            default_ttl_secs: 300,
            max_ttl_secs: 3600,
            deny_ttl_max_secs: 60,
        };
        let service = AuthzService::new(
            &PolicyConfig::default(),
            &DomainBreakerConfig::default(),
            &DomainRetryConfig::default(),
            &cache,
            None,
        );
        let deny = Decision {
            allow: false,
            reason: "denied".into(),
            filtered_parameters: None,
            cache_ttl_secs: 3600,
            fingerprint: None,
            stable: false,
            reason_sensitive: false,
        };
        assert!(service.ttl_for(&deny).unwrap() <= Duration::from_secs(60));
    }

    #[test]
    fn ttl_for_zero_is_not_cached() {
        let cache = CacheConfig {
            capacity: 10,
            default_ttl_secs: 300,
            max_ttl_secs: 3600,
            deny_ttl_max_secs: 60,
        };
        let service = AuthzService::new(
            &PolicyConfig::default(),
            &DomainBreakerConfig::default(),
            &DomainRetryConfig::default(),
            &cache,
            None,
        );
        let fresh_every_time = Decision {
            allow: true,
            reason: "ok".into(),
            filtered_parameters: None,
            cache_ttl_secs: 0,
            fingerprint: None,
            stable: false,
            reason_sensitive: false,
        };
        assert!(service.ttl_for(&fresh_every_time).is_none());
    }

    #[test]
    fn ttl_for_stable_deny_uses_max_ttl_bound() {
        let cache = CacheConfig {
            capacity: 10,
            default_ttl_secs: 300,
            max_ttl_secs: 3600,
            deny_ttl_max_secs: 60,
        };
        let service = AuthzService::new(
            &PolicyConfig::default(),
            &DomainBreakerConfig::default(),
            &DomainRetryConfig::default(),
            &cache,
            None,
        );
        let deny = Decision {
            allow: false,
            reason: "permanently denied".into(),
            filtered_parameters: None,
            cache_ttl_secs: 3600,
            fingerprint: None,
            stable: true,
            reason_sensitive: false,
        };
        assert!(service.ttl_for(&deny).unwrap() > Duration::from_secs(60));
    }

    #[tokio::test]
    async fn engine_unreachable_fails_closed_by_default() {
        let service = AuthzService::new(
            &PolicyConfig {
                engine_url: "http://127.0.0.1:1".into(),
                fail_closed: true,
            },
            &DomainBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
            &DomainRetryConfig {
                max_attempts: 1,
                total_deadline_ms: 500,
                ..Default::default()
            },
            &CacheConfig::default(),
            None,
        );
        let decision = service.authorize(&sample_principal(), &sample_target(), "invoke").await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "policy_unavailable");
    }
}
