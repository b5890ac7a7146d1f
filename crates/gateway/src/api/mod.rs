pub mod auth;
pub mod authorize;
pub mod dispatch;
pub mod dto;
pub mod error;
pub mod health;
pub mod metrics;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Public routes need no bearer token; everything else does. Mirrors the
/// split-then-merge-with-a-route-layer pattern: the protected half gets
/// `require_api_token` applied via `route_layer`, which runs the
/// middleware only for routes registered before the call. Returns an
/// unstated router so the caller can add its own layers before the final
/// `with_state`.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        .route("/v1/health/detailed", get(health::health_detailed))
        .route("/v1/authorize", post(authorize::authorize))
        .route("/v1/authorize/a2a", post(authorize::authorize_a2a))
        .route("/v1/invoke", post(dispatch::invoke))
        .route("/metrics", get(metrics::metrics))
        .route_layer(axum::middleware::from_fn_with_state(state, auth::require_api_token));

    public.merge(protected)
}
