//! Per-principal token-bucket rate limiting, checked before a request ever
//! reaches the authorization service. Structurally this mirrors a registry
//! of per-key usage state behind a single `RwLock`; unlike a daily-rollover
//! counter, each bucket refills continuously from its last-seen timestamp.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use aegis_domain::config::RateLimitConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    rate_per_sec: f64,
    burst: f64,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            rate_per_sec: config.per_principal_rps as f64,
            burst: config.burst as f64,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Refills the caller's bucket for elapsed time, then attempts to spend
    /// one token. Returns `true` if the request is admitted.
    pub fn try_acquire(&self, principal_id: &str) -> bool {
        let now = Instant::now();

        if let Some(bucket) = self.buckets.write().get_mut(principal_id) {
            return self.spend(bucket, now);
        }

        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(principal_id.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last_refill: now,
        });
        self.spend(bucket, now)
    }

    fn spend(&self, bucket: &mut Bucket, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets untouched for longer than `idle_for`, bounding memory
    /// use under a large population of distinct, mostly-one-shot principals.
    pub fn sweep_idle(&self, idle_for: Duration) {
        let now = Instant::now();
        self.buckets
            .write()
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle_for);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rps: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            per_principal_rps: rps,
            burst,
        }
    }

    #[test]
    fn admits_up_to_burst_then_rejects() {
        let limiter = RateLimiter::new(&config(1, 3));
        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("alice"));
        assert!(!limiter.try_acquire("alice"));
    }

    #[test]
    fn distinct_principals_have_independent_buckets() {
        let limiter = RateLimiter::new(&config(1, 1));
        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("bob"));
        assert!(!limiter.try_acquire("alice"));
    }

    #[test]
    fn sweep_idle_drops_stale_buckets() {
        let limiter = RateLimiter::new(&config(1, 1));
        limiter.try_acquire("alice");
        limiter.sweep_idle(Duration::from_secs(0));
        assert!(limiter.buckets.read().is_empty());
    }
}
