//! Caps the number of concurrent in-flight calls to a single resource so one
//! slow adapter cannot starve the whole worker pool.

use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::ResilienceError;

pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Bulkhead {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub async fn run<T, E, Fut>(&self, fut: Fut) -> Result<T, ResilienceError<E>>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                return Err(ResilienceError::Bulkhead {
                    max_concurrency: self.max_concurrency,
                })
            }
            Err(TryAcquireError::Closed) => {
                return Err(ResilienceError::Bulkhead {
                    max_concurrency: self.max_concurrency,
                })
            }
        };
        let result = fut.await.map_err(ResilienceError::Inner);
        drop(permit);
        result
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_within_limit() {
        let bulkhead = Bulkhead::new(2);
        let result: Result<_, ResilienceError<std::convert::Infallible>> =
            bulkhead.run(async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(bulkhead.available_permits(), 2);
    }

    #[tokio::test]
    async fn rejects_when_full() {
        let bulkhead = Arc::new(Bulkhead::new(1));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let b = bulkhead.clone();
        let held = tokio::spawn(async move {
            let _: Result<(), ResilienceError<std::convert::Infallible>> = b
                .run(async {
                    rx.await.ok();
                    Ok(())
                })
                .await;
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let result: Result<_, ResilienceError<std::convert::Infallible>> =
            bulkhead.run(async { Ok(1) }).await;
        assert!(result.unwrap_err().is_bulkhead_full());

        tx.send(()).ok();
        held.await.unwrap();
    }
}
