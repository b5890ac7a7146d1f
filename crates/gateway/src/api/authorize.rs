use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::Json;
use std::net::SocketAddr;

use crate::api::dto::{A2aAuthorizeRequest, AuthorizeRequest, AuthorizeResponse};
use crate::state::AppState;

pub async fn authorize(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<AuthorizeRequest>,
) -> impl IntoResponse {
    let principal = request.principal.into_principal(addr.ip().to_string());
    let target = request.target.into_target();

    let decision = state.authz.authorize(&principal, &target, &request.action).await;

    Json(AuthorizeResponse {
        allow: decision.allow,
        reason: decision.caller_facing_reason().to_string(),
        filtered_parameters: decision.filtered_parameters.clone(),
        cache_ttl_secs: decision.cache_ttl_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{PrincipalDescriptor, TargetDescriptor};
    use crate::test_support::test_state;
    use aegis_domain::entities::{Protocol, SensitivityTier, Visibility};
    use axum::Json as AxumJson;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn local_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000)
    }

    #[tokio::test]
    async fn unreachable_policy_engine_fails_closed() {
        let state = test_state();
        let request = AuthorizeRequest {
            principal: PrincipalDescriptor {
                id: "svc-a".into(),
                roles: Default::default(),
                teams: Default::default(),
                scopes: Default::default(),
                trust_level: None,
            },
            action: "invoke".into(),
            target: TargetDescriptor {
                protocol: Protocol::Http,
                server_handle: "search-1".into(),
                capability: "search.query".into(),
                sensitivity: SensitivityTier::Medium,
                owning_team: "platform".into(),
                visibility: Visibility::Internal,
                parameters: serde_json::Value::Null,
            },
        };

        let response = authorize(State(state), ConnectInfo(local_addr()), AxumJson(request))
            .await
            .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
    State(state): State<AppState>,
    Json(request): Json<A2aAuthorizeRequest>,
) -> impl IntoResponse {
    let decision = state
        .authz
        .authorize_a2a(&request.source_agent, &request.target_agent, &request.capability)
        .await;

    Json(AuthorizeResponse {
        allow: decision.allow,
        reason: decision.caller_facing_reason().to_string(),
        filtered_parameters: decision.filtered_parameters.clone(),
        cache_ttl_secs: decision.cache_ttl_secs,
    })
}
