//! Tracks in-flight requests to a single subprocess so the stdout reader
//! task can route each line back to the caller waiting on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::protocol::JsonRpcError;

pub type SlotResult = Result<Value, JsonRpcError>;

pub struct CorrelationMap {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<SlotResult>>>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves the next request id and registers a slot for its response.
    pub fn register(&self) -> (u64, oneshot::Receiver<SlotResult>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        (id, rx)
    }

    /// Completes the slot for `id`, if one is still waiting. Returns false
    /// when the id is unknown (already completed, cancelled, or bogus).
    pub fn complete(&self, id: u64, result: SlotResult) -> bool {
        if let Some(tx) = self.pending.lock().remove(&id) {
            let _ = tx.send(result);
            true
        } else {
            false
        }
    }

    pub fn cancel(&self, id: u64) {
        self.pending.lock().remove(&id);
    }

    /// Drains every outstanding slot with a terminal error so no caller
    /// waits forever across a crash or shutdown.
    pub fn fail_all(&self, message: &str) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(JsonRpcError {
                code: -32000,
                message: message.to_string(),
                data: None,
            }));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for CorrelationMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_registered_slot() {
        let map = CorrelationMap::new();
        let (id, rx) = map.register();
        assert!(map.complete(id, Ok(Value::from(42))));
        assert_eq!(rx.await.unwrap().unwrap(), Value::from(42));
    }

    #[test]
    fn complete_unknown_id_is_noop() {
        let map = CorrelationMap::new();
        assert!(!map.complete(999, Ok(Value::Null)));
    }

    #[tokio::test]
    async fn fail_all_drains_every_waiter() {
        let map = CorrelationMap::new();
        let (_id1, rx1) = map.register();
        let (_id2, rx2) = map.register();
        let failed = map.fail_all("subprocess crashed");
        assert_eq!(failed, 2);
        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
        assert_eq!(map.pending_count(), 0);
    }
}
