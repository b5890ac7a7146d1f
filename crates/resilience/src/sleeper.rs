//! Pluggable sleep so retry-delay tests don't burn wall-clock time.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested sleep durations without actually waiting, for
/// assertions on retry pacing in unit tests.
#[derive(Default)]
pub struct TrackingSleeper {
    requested: Mutex<Vec<Duration>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested_durations(&self) -> Vec<Duration> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for TrackingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().unwrap().push(duration);
    }
}
