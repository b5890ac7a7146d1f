use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Uniform `{"error": "..."}` body for every failure path through the API.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub enum DispatchError {
    UnknownResource(String),
    Denied { reason: String },
    RateLimited,
    Adapter(aegis_adapters::AdapterError),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            DispatchError::UnknownResource(key) => {
                api_error(StatusCode::NOT_FOUND, format!("unknown resource: {key}"))
            }
            DispatchError::Denied { reason } => {
                (StatusCode::FORBIDDEN, Json(serde_json::json!({ "allow": false, "reason": reason }))).into_response()
            }
            DispatchError::RateLimited => api_error(StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            DispatchError::Adapter(err) => {
                let status = match &err {
                    aegis_adapters::AdapterError::ClientError(_) | aegis_adapters::AdapterError::UnknownCapability(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    aegis_adapters::AdapterError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                api_error(status, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_adapters::AdapterError;

    #[tokio::test]
    async fn unknown_resource_maps_to_404() {
        let response = DispatchError::UnknownResource("http:missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn denied_maps_to_403() {
        let response = DispatchError::Denied { reason: "blocked".into() }.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rate_limited_maps_to_429() {
        let response = DispatchError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn adapter_client_error_maps_to_400() {
        let response = DispatchError::Adapter(AdapterError::ClientError("bad args".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn adapter_timeout_maps_to_504() {
        let response = DispatchError::Adapter(AdapterError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn adapter_unhealthy_maps_to_502() {
        let response = DispatchError::Adapter(AdapterError::Unhealthy).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
