//! `POST /v1/invoke`: resolve the target resource, authorize, substitute any
//! filtered parameters, invoke through the resilience stack, and append a
//! terminal invocation audit event separate from the authorization event
//! the authorization service already recorded.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::Json;

use aegis_adapters::AdapterError;
use aegis_domain::entities::{AuditEvent, AuditEventKind, AuditOutcome};
use aegis_resilience::ResilienceError;

use crate::api::dto::{InvokeContentDto, InvokeRequest, InvokeResponse};
use crate::api::error::DispatchError;
use crate::state::AppState;

static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

pub async fn invoke(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<InvokeRequest>,
) -> Result<impl IntoResponse, DispatchError> {
    let start = Instant::now();
    let principal = request.principal.into_principal(addr.ip().to_string());
    let target = request.target.into_target();
    let resource_key = target.resource_key();

    if !state.rate_limiter.try_acquire(&principal.id) {
        return Err(DispatchError::RateLimited);
    }

    let adapter = state.registry.get(&resource_key).map_err(|_| DispatchError::UnknownResource(resource_key.clone()))?;

    let decision = state.authz.authorize(&principal, &target, "invoke").await;
    if !decision.allow {
        return Err(DispatchError::Denied {
            reason: decision.caller_facing_reason().to_string(),
        });
    }

    let parameters = decision.filtered_parameters.clone().unwrap_or(target.parameters.clone());
    let filtered = decision.filtered_parameters.is_some();

    let breaker = state.resource_guards.breaker_for(&resource_key);
    let capability = target.capability.clone();
    let params_for_call = parameters.clone();

    let outcome = dispatch_through_resilience(&state, &breaker, &adapter, &capability, params_for_call).await;

    let elapsed = start.elapsed();
    let (audit_outcome, response) = match &outcome {
        Ok(result) => (
            if result.is_error { AuditOutcome::Error } else { AuditOutcome::Success },
            None,
        ),
        Err(_) => (AuditOutcome::Error, None),
    };
    let _ = response;

    state
        .audit
        .publish(AuditEvent {
            id: NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed),
            kind: AuditEventKind::Invocation,
            principal_id: principal.id.clone(),
            source_ip: principal.ip.clone(),
            target_protocol: target.protocol,
            target_server: target.server_handle.clone(),
            target_capability: target.capability.clone(),
            allow: Some(true),
            reason: None,
            outcome: audit_outcome,
            duration_ms: elapsed.as_millis() as u64,
            timestamp: chrono::Utc::now(),
            filtered,
            context: serde_json::Value::Null,
        })
        .await;

    let result = outcome.map_err(DispatchError::Adapter)?;

    Ok(Json(InvokeResponse {
        content: result
            .content
            .into_iter()
            .map(|c| InvokeContentDto {
                content_type: c.content_type,
                text: c.text,
            })
            .collect(),
        is_error: result.is_error,
        filtered,
        duration_ms: elapsed.as_millis() as u64,
    }))
}

/// Runs one adapter call through breaker -> retry -> timeout, classifying
/// errors the way §4.5 requires: permission errors never retried, transient
/// transport errors retried, provider-level errors surfaced directly.
async fn dispatch_through_resilience(
    state: &AppState,
    breaker: &aegis_resilience::CircuitBreaker,
    adapter: &std::sync::Arc<dyn aegis_adapters::Adapter>,
    capability: &str,
    parameters: serde_json::Value,
) -> Result<aegis_adapters::InvokeResult, AdapterError> {
    breaker.check().map_err(|_| AdapterError::Unhealthy)?;

    let outcome = state
        .adapter_retry
        .run(|| async {
            state
                .adapter_timeout
                .run(adapter.invoke(capability, parameters.clone()))
                .await
                .map_err(|e| match e {
                    ResilienceError::Timeout { .. } => AdapterError::Timeout,
                    ResilienceError::Inner(inner) => inner,
                    other => AdapterError::Backend(other.to_string()),
                })
        })
        .await;

    match &outcome {
        Ok(_) => breaker.record_success(),
        Err(_) => breaker.record_failure(),
    }

    outcome.map_err(|e| match e {
        ResilienceError::RetryExhausted { failures, .. } => failures.into_iter().last().unwrap_or(AdapterError::Timeout),
        ResilienceError::Inner(inner) => inner,
        ResilienceError::Timeout { .. } => AdapterError::Timeout,
        _ => AdapterError::Unhealthy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{PrincipalDescriptor, TargetDescriptor};
    use crate::test_support::test_state;
    use aegis_domain::entities::{Protocol, SensitivityTier, Visibility};
    use axum::response::IntoResponse;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn local_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9100)
    }

    fn request(principal_id: &str) -> InvokeRequest {
        InvokeRequest {
            principal: PrincipalDescriptor {
                id: principal_id.into(),
                roles: Default::default(),
                teams: Default::default(),
                scopes: Default::default(),
                trust_level: None,
            },
            target: TargetDescriptor {
                protocol: Protocol::Http,
                server_handle: "missing-resource".into(),
                capability: "search.query".into(),
                sensitivity: SensitivityTier::Medium,
                owning_team: "platform".into(),
                visibility: Visibility::Internal,
                parameters: serde_json::Value::Null,
            },
        }
    }

    #[tokio::test]
    async fn unregistered_resource_is_rejected_before_authorize() {
        let state = test_state();
        let response = invoke(State(state), ConnectInfo(local_addr()), Json(request("svc-a")))
            .await
            .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_short_circuits_before_resource_lookup() {
        let state = test_state();
        // Drain the burst allowance so the very next call is rejected
        // without ever touching the (empty) adapter registry.
        for _ in 0..200 {
            state.rate_limiter.try_acquire("svc-rate-limited");
        }
        let response = invoke(State(state), ConnectInfo(local_addr()), Json(request("svc-rate-limited")))
            .await
            .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
    }
}
