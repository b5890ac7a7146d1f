//! Unified error type shared by every resilience policy.

use std::fmt;
use std::time::Duration;

/// Cap the number of stored failures inside `RetryExhausted` to avoid
/// unbounded growth on a pathological caller.
pub const MAX_RETRY_FAILURES: usize = 10;

#[derive(Debug)]
pub enum ResilienceError<E> {
    Timeout {
        elapsed: Duration,
        timeout: Duration,
    },
    CircuitOpen {
        failure_count: usize,
        open_duration: Duration,
    },
    Bulkhead {
        max_concurrency: usize,
    },
    RetryExhausted {
        attempts: usize,
        failures: Vec<E>,
    },
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { elapsed, timeout } => {
                write!(f, "operation timed out after {elapsed:?} (limit: {timeout:?})")
            }
            Self::CircuitOpen {
                failure_count,
                open_duration,
            } => write!(
                f,
                "circuit breaker open ({failure_count} failures, open for {open_duration:?})"
            ),
            Self::Bulkhead { max_concurrency } => {
                write!(f, "bulkhead full (max concurrency: {max_concurrency})")
            }
            Self::RetryExhausted { attempts, failures } => {
                let last = failures.last().map(|e| e.to_string()).unwrap_or_default();
                write!(
                    f,
                    "retry exhausted after {attempts} attempts ({} failures), last error: {last}",
                    failures.len()
                )
            }
            Self::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RetryExhausted { failures, .. } => {
                failures.last().map(|e| e as &dyn std::error::Error)
            }
            _ => None,
        }
    }
}

impl<E> ResilienceError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, Self::Bulkhead { .. })
    }

    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn timeout_display_contains_duration() {
        let err: ResilienceError<io::Error> = ResilienceError::Timeout {
            elapsed: Duration::from_millis(5100),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn predicates_cover_variants() {
        let timeout: ResilienceError<io::Error> = ResilienceError::Timeout {
            elapsed: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_circuit_open());
    }
}
