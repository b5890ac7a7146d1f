//! Bounded, TTL-keyed cache of policy decisions, keyed on the canonical
//! fingerprint of a `(principal, target, action)` tuple. Concurrent misses
//! for the same fingerprint are collapsed into a single upstream call
//! (single-flight); everyone else waits on the in-flight result.

mod metrics;

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use aegis_domain::entities::{Decision, Fingerprint};

pub use metrics::{CacheMetrics, CacheMetricsSnapshot};

#[derive(Clone)]
struct CacheEntry {
    decision: Decision,
    expires_at: Instant,
}

/// How long a freshly-computed decision should live in the cache. The
/// authorization layer decides this (it knows whether the decision is an
/// allow or a deny and applies the shorter negative-caching bound), the
/// cache just enforces whatever it's told.
pub struct PolicyCache {
    capacity: usize,
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
    order: Mutex<VecDeque<Fingerprint>>,
    inflight: tokio::sync::Mutex<HashMap<Fingerprint, Arc<Notify>>>,
    metrics: CacheMetrics,
}

impl PolicyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            inflight: tokio::sync::Mutex::new(HashMap::new()),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<Decision> {
        let now = Instant::now();
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.metrics.record_hit();
                Some(entry.decision.clone())
            }
            Some(_) => {
                self.metrics.record_expiration();
                None
            }
            None => None,
        }
    }

    pub fn invalidate(&self, key: &Fingerprint) {
        self.entries.write().remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
        self.order.lock().clear();
    }

    pub fn insert(&self, key: Fingerprint, decision: Decision, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.write();
        let is_new = !entries.contains_key(&key);
        entries.insert(
            key,
            CacheEntry {
                decision,
                expires_at,
            },
        );
        if is_new {
            let mut order = self.order.lock();
            order.push_back(key);
            while entries.len() > self.capacity {
                if let Some(oldest) = order.pop_front() {
                    if entries.remove(&oldest).is_some() {
                        self.metrics.record_eviction();
                    }
                } else {
                    break;
                }
            }
        }
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot(self.entries.read().len())
    }

    /// Looks up `key`; on miss, runs `compute` exactly once across all
    /// concurrent callers racing on the same fingerprint and caches the
    /// result for `ttl_for(&result)` before returning it to every waiter.
    /// A `ttl_for` that returns `None` means the decision is not cached at
    /// all; every other waiter still gets the computed result, it's just
    /// not stored for the next miss.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: Fingerprint,
        compute: F,
        ttl_for: impl Fn(&Decision) -> Option<Duration>,
    ) -> Result<Decision, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decision, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        self.metrics.record_miss();

        let notify = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(&key) {
                Some(existing.clone())
            } else {
                inflight.insert(key, Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = notify {
            self.metrics.record_single_flight_suppressed();
            notify.notified().await;
            if let Some(hit) = self.get(&key) {
                return Ok(hit);
            }
            // The leader's compute failed and left nothing cached; fall
            // through and become the new leader rather than stall forever.
            return Box::pin(self.get_or_compute(key, compute, ttl_for)).await;
        }

        let result = compute().await;
        if let Ok(decision) = &result {
            if let Some(ttl) = ttl_for(decision) {
                self.insert(key, decision.clone(), ttl);
            }
        }

        let leader_notify = {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(&key)
        };
        if let Some(notify) = leader_notify {
            notify.notify_waiters();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn allow_decision() -> Decision {
        Decision {
            allow: true,
            reason: "ok".into(),
            filtered_parameters: None,
            cache_ttl_secs: 60,
            fingerprint: None,
            stable: false,
            reason_sensitive: false,
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let cache = PolicyCache::new(10);
        let key = Fingerprint([1u8; 32]);
        cache.insert(key, allow_decision(), Duration::from_secs(60));
        assert!(cache.get(&key).unwrap().allow);
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = PolicyCache::new(10);
        let key = Fingerprint([2u8; 32]);
        cache.insert(key, allow_decision(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let cache = PolicyCache::new(2);
        let keys: Vec<Fingerprint> = (0..3).map(|i| Fingerprint([i; 32])).collect();
        for key in &keys {
            cache.insert(*key, allow_decision(), Duration::from_secs(60));
        }
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[2]).is_some());
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn invalidate_all_clears_cache() {
        let cache = PolicyCache::new(10);
        let key = Fingerprint([3u8; 32]);
        cache.insert(key, allow_decision(), Duration::from_secs(60));
        cache.invalidate_all();
        assert!(cache.get(&key).is_none());
    }

    #[tokio::test]
    async fn concurrent_misses_collapse_into_one_compute() {
        let cache = Arc::new(PolicyCache::new(10));
        let key = Fingerprint([4u8; 32]);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute::<_, _, std::convert::Infallible>(
                        key,
                        || {
                            let calls = calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                Ok(allow_decision())
                            }
                        },
                        |_| Some(Duration::from_secs(60)),
                    )
                    .await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().unwrap().allow);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
