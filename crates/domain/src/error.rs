use thiserror::Error;

/// The error taxonomy shared across every crate in the gateway.
///
/// Variants map 1:1 onto the kinds an operator needs to reason about at the
/// request boundary: what gets retried, what gets audited, what gets
/// surfaced to the caller verbatim.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("policy engine unavailable: {0}")]
    PolicyUnavailable(String),

    #[error("transient transport error: {0}")]
    TransientTransport(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("internal error ({id}): {message}")]
    Internal { id: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable, machine-readable kind used in HTTP bodies and audit events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Authentication(_) => "auth_failed",
            Error::Permission(_) => "permission_denied",
            Error::Validation(_) => "validation_error",
            Error::RateLimited => "rate_limited",
            Error::PolicyUnavailable(_) => "policy_unavailable",
            Error::TransientTransport(_) => "upstream_unavailable",
            Error::Provider(_) => "provider_error",
            Error::ResourceLimit(_) => "transport_reset",
            Error::Internal { .. } => "internal_error",
            Error::Io(_) => "upstream_unavailable",
            Error::Json(_) => "validation_error",
        }
    }

    /// Whether the resilience stack should treat this as retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientTransport(_) | Error::Io(_))
    }

    /// Build an internal error with a fresh correlation id, logging the
    /// underlying detail that never crosses the request boundary.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::error!(error_id = %id, detail = %detail, "internal invariant violation");
        Error::Internal {
            id,
            message: "internal_error".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_strings() {
        assert_eq!(Error::RateLimited.kind(), "rate_limited");
        assert_eq!(
            Error::Permission("no scope".into()).kind(),
            "permission_denied"
        );
    }

    #[test]
    fn only_transient_and_io_are_retryable() {
        assert!(Error::TransientTransport("timeout".into()).is_retryable());
        assert!(!Error::Permission("denied".into()).is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn internal_error_never_leaks_detail_in_message() {
        let err = Error::internal("leaked secret detail");
        assert_eq!(err.kind(), "internal_error");
        match err {
            Error::Internal { message, .. } => assert_eq!(message, "internal_error"),
            _ => panic!("expected Internal"),
        }
    }
}
