//! Bearer-token gate applied to every protected route. The configured
//! token is hashed once at startup; the request's token is hashed per call
//! and compared in constant time so a timing side-channel can't leak it
//! byte by byte.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected_hash) = state.api_token_hash else {
        // Dev mode: no token configured, already warned about at startup.
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = presented else {
        return api_error(StatusCode::UNAUTHORIZED, "missing bearer token");
    };

    let presented_hash = hash_token(token);
    if presented_hash.ct_eq(&expected_hash).into() {
        next.run(request).await
    } else {
        api_error(StatusCode::UNAUTHORIZED, "invalid bearer token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_token("a"), hash_token("a"));
        assert_ne!(hash_token("a"), hash_token("b"));
    }
}
