use axum::extract::State;
use axum::response::IntoResponse;

use aegis_resilience::BreakerState;

use crate::state::AppState;

/// Prometheus text-format exposition, aggregating cache, audit, and
/// per-resource circuit-breaker metrics into process-wide gauges.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.authz.cache_metrics();
    let audit = state.audit.metrics();
    let breakers = state.resource_guards.snapshot();

    let mut out = String::new();

    out.push_str("# HELP aegis_cache_hits_total Policy cache hits\n");
    out.push_str("# TYPE aegis_cache_hits_total counter\n");
    out.push_str(&format!("aegis_cache_hits_total {}\n", cache.hits));
    out.push_str("# HELP aegis_cache_misses_total Policy cache misses\n");
    out.push_str("# TYPE aegis_cache_misses_total counter\n");
    out.push_str(&format!("aegis_cache_misses_total {}\n", cache.misses));
    out.push_str("# HELP aegis_cache_single_flight_suppressed_total Concurrent misses collapsed into one upstream call\n");
    out.push_str("# TYPE aegis_cache_single_flight_suppressed_total counter\n");
    out.push_str(&format!(
        "aegis_cache_single_flight_suppressed_total {}\n",
        cache.single_flight_suppressed
    ));
    out.push_str("# HELP aegis_cache_evictions_total Entries evicted for capacity\n");
    out.push_str("# TYPE aegis_cache_evictions_total counter\n");
    out.push_str(&format!("aegis_cache_evictions_total {}\n", cache.evictions));
    out.push_str("# HELP aegis_cache_size Current cache entry count\n");
    out.push_str("# TYPE aegis_cache_size gauge\n");
    out.push_str(&format!("aegis_cache_size {}\n", cache.size));

    out.push_str("# HELP aegis_audit_dropped_total Audit events dropped under backpressure\n");
    out.push_str("# TYPE aegis_audit_dropped_total counter\n");
    out.push_str(&format!("aegis_audit_dropped_total {}\n", audit.dropped));
    out.push_str("# HELP aegis_audit_written_total Audit events written to the sink\n");
    out.push_str("# TYPE aegis_audit_written_total counter\n");
    out.push_str(&format!("aegis_audit_written_total {}\n", audit.written));
    out.push_str("# HELP aegis_audit_retries_total Audit sink write retries\n");
    out.push_str("# TYPE aegis_audit_retries_total counter\n");
    out.push_str(&format!("aegis_audit_retries_total {}\n", audit.retries));

    out.push_str("# HELP aegis_resource_breaker_state Circuit breaker state per resource (0=closed, 1=open, 2=half_open)\n");
    out.push_str("# TYPE aegis_resource_breaker_state gauge\n");
    for (resource_id, breaker_state) in breakers {
        let value = match breaker_state {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        };
        out.push_str(&format!(
            "aegis_resource_breaker_state{{resource=\"{resource_id}\"}} {value}\n"
        ));
    }

    ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn exposition_contains_expected_metric_families() {
        let state = test_state();
        let response = metrics(State(state)).await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
