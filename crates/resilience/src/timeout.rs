//! Wraps an async operation in a hard wall-clock deadline.

use std::time::Duration;

use crate::error::ResilienceError;

/// Guards against a misconfigured, effectively-unbounded timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: duration.min(MAX_TIMEOUT),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn run<T, E, Fut>(&self, fut: Fut) -> Result<T, ResilienceError<E>>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let start = tokio::time::Instant::now();
        match tokio::time::timeout(self.duration, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ResilienceError::Inner(err)),
            Err(_) => Err(ResilienceError::Timeout {
                elapsed: start.elapsed(),
                timeout: self.duration,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_deadline() {
        let policy = TimeoutPolicy::new(Duration::from_millis(50));
        let result = policy
            .run(async { Ok::<_, std::convert::Infallible>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn times_out_slow_operation() {
        let policy = TimeoutPolicy::new(Duration::from_millis(10));
        let result: Result<(), ResilienceError<std::convert::Infallible>> = policy
            .run(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[test]
    fn clamps_to_max_timeout() {
        let policy = TimeoutPolicy::new(Duration::from_secs(10_000));
        assert_eq!(policy.duration(), MAX_TIMEOUT);
    }
}
