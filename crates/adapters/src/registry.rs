use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use aegis_domain::entities::{AdapterResource, HealthStatus, Protocol};

use crate::adapter::Adapter;
use crate::error::{AdapterError, Result};

/// Holds every live adapter-backed resource, keyed on the `(protocol,
/// server_handle)` pair that `Target::resource_key` produces.
pub struct AdapterRegistry {
    resources: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, key: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.resources.write().insert(key.into(), adapter);
    }

    pub fn remove(&self, key: &str) -> Option<Arc<dyn Adapter>> {
        self.resources.write().remove(key)
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn Adapter>> {
        self.resources
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownResource(key.to_string()))
    }

    pub fn resource_count(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    pub async fn health_snapshot(&self) -> Vec<AdapterResource> {
        let adapters: Vec<(String, Arc<dyn Adapter>)> = self
            .resources
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut out = Vec::with_capacity(adapters.len());
        for (key, adapter) in adapters {
            let health = adapter.health().await;
            out.push(AdapterResource {
                resource_id: key,
                protocol: protocol_from_resource_id(adapter.resource_id()),
                health,
                last_healthy_at: if health == HealthStatus::Healthy {
                    Some(chrono::Utc::now())
                } else {
                    None
                },
            });
        }
        out
    }

    pub async fn close_all(&self) {
        let adapters: Vec<Arc<dyn Adapter>> = self.resources.write().drain().map(|(_, v)| v).collect();
        for adapter in adapters {
            adapter.close().await;
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn protocol_from_resource_id(resource_id: &str) -> Protocol {
    match resource_id.split_once(':').map(|(p, _)| p) {
        Some("http") => Protocol::Http,
        Some("grpc") => Protocol::Grpc,
        _ => Protocol::Stdio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityDef, InvokeResult};
    use async_trait::async_trait;

    struct StubAdapter {
        id: String,
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn resource_id(&self) -> &str {
            &self.id
        }

        async fn discover(&self) -> Result<Vec<CapabilityDef>> {
            Ok(vec![])
        }

        fn list_capabilities(&self) -> Vec<CapabilityDef> {
            vec![]
        }

        async fn invoke(&self, _capability: &str, _parameters: serde_json::Value) -> Result<InvokeResult> {
            Ok(InvokeResult::text("ok"))
        }

        async fn invoke_stream(
            &self,
            _capability: &str,
            _parameters: serde_json::Value,
        ) -> Result<crate::adapter::InvokeStream> {
            Err(AdapterError::Protocol("streaming not supported".into()))
        }

        async fn health(&self) -> HealthStatus {
            HealthStatus::Healthy
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn register_and_get_roundtrips() {
        let registry = AdapterRegistry::new();
        registry.register(
            "stdio:fs-1",
            Arc::new(StubAdapter {
                id: "stdio:fs-1".into(),
            }),
        );
        assert_eq!(registry.resource_count(), 1);
        assert!(registry.get("stdio:fs-1").is_ok());
        assert!(registry.get("missing").is_err());
    }

    #[tokio::test]
    async fn health_snapshot_reports_all_resources() {
        let registry = AdapterRegistry::new();
        registry.register(
            "http:search-1",
            Arc::new(StubAdapter {
                id: "http:search-1".into(),
            }),
        );
        let snapshot = registry.health_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].protocol, Protocol::Http);
    }
}
