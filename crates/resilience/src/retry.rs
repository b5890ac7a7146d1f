//! Retry policy: re-invoke a fallible async operation with backoff until it
//! succeeds, a non-retryable error is hit, or the attempt budget is spent.

use std::sync::Arc;

use crate::backoff::{delay_for_attempt, BackoffConfig};
use crate::error::{ResilienceError, MAX_RETRY_FAILURES};
use crate::sleeper::{InstantSleeper, Sleeper};

pub struct RetryPolicy<E> {
    max_attempts: usize,
    backoff: BackoffConfig,
    sleeper: Arc<dyn Sleeper>,
    is_retryable: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> RetryPolicy<E> {
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::default()
    }

    /// Runs `op` until it succeeds, an error is classified non-retryable, or
    /// `max_attempts` is reached. `op` is called at least once.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut failures = Vec::new();
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = (self.is_retryable)(&err);
                    if failures.len() < MAX_RETRY_FAILURES {
                        failures.push(err);
                    }
                    if !retryable || attempt >= self.max_attempts {
                        return Err(ResilienceError::RetryExhausted {
                            attempts: attempt,
                            failures,
                        });
                    }
                    let delay = delay_for_attempt(&self.backoff, attempt as u32 - 1);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}

pub struct RetryPolicyBuilder<E> {
    max_attempts: usize,
    backoff: BackoffConfig,
    sleeper: Arc<dyn Sleeper>,
    is_retryable: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffConfig::default(),
            sleeper: Arc::new(InstantSleeper),
            is_retryable: Arc::new(|_| true),
        }
    }
}

impl<E> RetryPolicyBuilder<E> {
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn retryable_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_retryable = Arc::new(predicate);
        self
    }

    pub fn build(self) -> RetryPolicy<E> {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            sleeper: self.sleeper,
            is_retryable: self.is_retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::TrackingSleeper;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy: RetryPolicy<&'static str> = RetryPolicy::builder().max_attempts(3).build();
        let calls = AtomicUsize::new(0);
        let result = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(42)
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let sleeper = Arc::new(TrackingSleeper::new());
        let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
            .max_attempts(5)
            .sleeper(sleeper.clone())
            .build();
        let calls = AtomicUsize::new(0);
        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeper.requested_durations().len(), 2);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
            .max_attempts(5)
            .retryable_if(|e| *e != "fatal")
            .build();
        let result: Result<(), _> = policy.run(|| async { Err("fatal") }).await;
        match result.unwrap_err() {
            ResilienceError::RetryExhausted { attempts, failures } => {
                assert_eq!(attempts, 1);
                assert_eq!(failures, vec!["fatal"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let policy: RetryPolicy<&'static str> = RetryPolicy::builder().max_attempts(3).build();
        let result: Result<(), _> = policy.run(|| async { Err("down") }).await;
        match result.unwrap_err() {
            ResilienceError::RetryExhausted { attempts, failures } => {
                assert_eq!(attempts, 3);
                assert_eq!(failures.len(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
