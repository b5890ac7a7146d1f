use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use aegis_resilience::BreakerState;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct ResourceHealth {
    resource_id: String,
    protocol: &'static str,
    health: &'static str,
    breaker_state: &'static str,
}

#[derive(Serialize)]
struct DetailedHealth {
    uptime_secs: u64,
    resource_count: usize,
    cache: aegis_policy_cache::CacheMetricsSnapshot,
    audit: aegis_audit::AuditMetricsSnapshot,
    resources: Vec<ResourceHealth>,
}

fn breaker_label(state: BreakerState) -> &'static str {
    match state {
        BreakerState::Closed => "closed",
        BreakerState::Open => "open",
        BreakerState::HalfOpen => "half_open",
    }
}

pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let resources = state.registry.health_snapshot().await;
    let breaker_states: std::collections::HashMap<String, BreakerState> =
        state.resource_guards.snapshot().into_iter().collect();

    let resources = resources
        .into_iter()
        .map(|r| {
            let breaker = breaker_states
                .get(&r.resource_id)
                .copied()
                .map(breaker_label)
                .unwrap_or("closed");
            ResourceHealth {
                resource_id: r.resource_id,
                protocol: r.protocol.as_str(),
                health: match r.health {
                    aegis_domain::entities::HealthStatus::Healthy => "healthy",
                    aegis_domain::entities::HealthStatus::Unhealthy => "unhealthy",
                },
                breaker_state: breaker,
            }
        })
        .collect::<Vec<_>>();

    Json(DetailedHealth {
        uptime_secs: state.started_at.elapsed().as_secs(),
        resource_count: state.registry.resource_count(),
        cache: state.authz.cache_metrics(),
        audit: state.audit.metrics(),
        resources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn health_detailed_reports_zero_resources_when_empty() {
        let state = test_state();
        let response = health_detailed(State(state)).await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn breaker_label_covers_every_state() {
        assert_eq!(breaker_label(BreakerState::Closed), "closed");
        assert_eq!(breaker_label(BreakerState::Open), "open");
        assert_eq!(breaker_label(BreakerState::HalfOpen), "half_open");
    }
}
