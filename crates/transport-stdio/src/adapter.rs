use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use aegis_adapters::{Adapter, AdapterError, CapabilityDef, InvokeResult, InvokeStream};
use aegis_domain::entities::HealthStatus;

use crate::health::HealthSampler;
use crate::process::{ManagedProcess, ProcessError};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct StdioAdapter {
    resource_id: String,
    process: Arc<ManagedProcess>,
    capabilities: RwLock<Vec<CapabilityDef>>,
    sampler: tokio::sync::Mutex<HealthSampler>,
}

impl StdioAdapter {
    pub fn new(resource_id: impl Into<String>, process: Arc<ManagedProcess>) -> Self {
        Self {
            resource_id: resource_id.into(),
            process,
            capabilities: RwLock::new(Vec::new()),
            sampler: tokio::sync::Mutex::new(HealthSampler::new()),
        }
    }

    pub async fn start(&self) -> Result<(), ProcessError> {
        self.process.start().await
    }
}

fn map_process_error(err: ProcessError) -> AdapterError {
    match err {
        ProcessError::Timeout => AdapterError::Timeout,
        ProcessError::NotRunning | ProcessError::Failed | ProcessError::Disconnected => {
            AdapterError::Unhealthy
        }
        other => AdapterError::Backend(other.to_string()),
    }
}

#[async_trait]
impl Adapter for StdioAdapter {
    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    async fn discover(&self) -> aegis_adapters::Result<Vec<CapabilityDef>> {
        let value = self
            .process
            .call("capabilities/list", None, DEFAULT_CALL_TIMEOUT)
            .await
            .map_err(map_process_error)?;

        #[derive(serde::Deserialize)]
        struct ListResult {
            capabilities: Vec<CapabilityDef>,
        }
        let parsed: ListResult = serde_json::from_value(value)
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        *self.capabilities.write() = parsed.capabilities.clone();
        Ok(parsed.capabilities)
    }

    fn list_capabilities(&self) -> Vec<CapabilityDef> {
        self.capabilities.read().clone()
    }

    async fn invoke(&self, capability: &str, parameters: Value) -> aegis_adapters::Result<InvokeResult> {
        let params = serde_json::json!({ "capability": capability, "parameters": parameters });
        let value = self
            .process
            .call("capability/invoke", Some(params), DEFAULT_CALL_TIMEOUT)
            .await
            .map_err(map_process_error)?;
        serde_json::from_value(value).map_err(|e| AdapterError::Protocol(e.to_string()))
    }

    async fn invoke_stream(&self, _capability: &str, _parameters: Value) -> aegis_adapters::Result<InvokeStream> {
        Err(AdapterError::Protocol(
            "stdio transport does not support streamed invocation".into(),
        ))
    }

    async fn health(&self) -> HealthStatus {
        let mut sampler = self.sampler.lock().await;
        self.process.health(&mut sampler).await
    }

    async fn close(&self) {
        self.process.stop().await;
    }
}
