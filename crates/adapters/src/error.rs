#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("adapter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire protocol error: {0}")]
    Protocol(String),

    #[error("capability not found: {0}")]
    UnknownCapability(String),

    #[error("backend returned an error: {0}")]
    Backend(String),

    #[error("timed out waiting for backend response")]
    Timeout,

    #[error("adapter resource is unhealthy")]
    Unhealthy,

    #[error("resource not found: {0}")]
    UnknownResource(String),

    #[error("backend rejected the request: {0}")]
    ClientError(String),

    #[error("backend is temporarily unavailable: {0}")]
    ServerError(String),
}

impl AdapterError {
    /// Whether the retry helper should re-attempt this call. Network
    /// failures, timeouts, and 5xx responses are transient; 4xx responses
    /// and protocol/schema mismatches are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::Io(_) | AdapterError::Timeout | AdapterError::ServerError(_) | AdapterError::Unhealthy
        )
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
