use thiserror::Error;

/// Failure modes of a single call to the external policy engine. Only
/// network-ish and 5xx failures are retried; everything else surfaces
/// immediately.
#[derive(Debug, Error, Clone)]
pub enum AuthzError {
    #[error("policy engine request failed: {0}")]
    Transport(String),

    #[error("policy engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("policy engine response could not be decoded: {0}")]
    Decode(String),

    #[error("policy engine call timed out")]
    Timeout,

    #[error("policy engine circuit breaker is open")]
    CircuitOpen,
}

impl AuthzError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthzError::Transport(_) | AuthzError::Timeout => true,
            AuthzError::Status { status, .. } => *status >= 500,
            AuthzError::Decode(_) | AuthzError::CircuitOpen => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        AuthzError::Transport(err.to_string())
    }
}
