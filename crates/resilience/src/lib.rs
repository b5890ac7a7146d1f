//! Resilience primitives shared by every transport adapter: timeouts,
//! retries with backoff, per-resource circuit breakers, and bulkheads.

pub mod backoff;
pub mod bulkhead;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod retry;
pub mod sleeper;
pub mod timeout;

pub use backoff::BackoffConfig;
pub use bulkhead::Bulkhead;
pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::ResilienceError;
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use sleeper::{InstantSleeper, Sleeper, TrackingSleeper};
pub use timeout::{TimeoutPolicy, MAX_TIMEOUT};
