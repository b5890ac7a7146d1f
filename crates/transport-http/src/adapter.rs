use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use aegis_adapters::{Adapter, AdapterError, CapabilityDef, InvokeChunk, InvokeResult, InvokeStream};
use aegis_domain::entities::HealthStatus;

use crate::descriptor::{CapabilityEntry, DescriptorDocument};
use crate::sse::drain_data_lines;

#[derive(Debug, Clone)]
pub struct HttpResourceConfig {
    pub base_url: String,
    pub discovery_url: String,
    pub bearer_token: Option<String>,
    pub max_connections: usize,
    pub request_timeout: Duration,
}

impl Default for HttpResourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            discovery_url: String::new(),
            bearer_token: None,
            max_connections: 50,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpAdapter {
    resource_id: String,
    config: HttpResourceConfig,
    client: reqwest::Client,
    capabilities: RwLock<Vec<CapabilityEntry>>,
}

impl HttpAdapter {
    pub fn new(resource_id: impl Into<String>, config: HttpResourceConfig) -> aegis_adapters::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_connections)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        Ok(Self {
            resource_id: resource_id.into(),
            config,
            client,
            capabilities: RwLock::new(Vec::new()),
        })
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn find_capability(&self, name: &str) -> aegis_adapters::Result<CapabilityEntry> {
        self.capabilities
            .read()
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownCapability(name.to_string()))
    }

    fn classify_response_status(status: reqwest::StatusCode, body: String) -> AdapterError {
        if status.is_server_error() {
            AdapterError::ServerError(format!("{status}: {body}"))
        } else if status.is_client_error() {
            AdapterError::ClientError(format!("{status}: {body}"))
        } else {
            AdapterError::Backend(format!("{status}: {body}"))
        }
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    async fn discover(&self) -> aegis_adapters::Result<Vec<CapabilityDef>> {
        let request = self.apply_auth(self.client.get(&self.config.discovery_url));
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_response_status(status, body));
        }

        let doc: DescriptorDocument = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let defs: Vec<CapabilityDef> = doc.capabilities.iter().map(CapabilityDef::from).collect();
        *self.capabilities.write() = doc.capabilities;
        Ok(defs)
    }

    fn list_capabilities(&self) -> Vec<CapabilityDef> {
        self.capabilities.read().iter().map(CapabilityDef::from).collect()
    }

    async fn invoke(&self, capability: &str, parameters: Value) -> aegis_adapters::Result<InvokeResult> {
        let entry = self.find_capability(capability)?;
        let url = format!("{}{}", self.config.base_url, entry.path);
        let builder = match entry.method.to_uppercase().as_str() {
            "GET" => self.client.get(&url).query(&parameters),
            _ => self.client.post(&url).json(&parameters),
        };
        let request = self.apply_auth(builder);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_response_status(status, body));
        }

        let body: Value = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        Ok(InvokeResult::text(body.to_string()))
    }

    async fn invoke_stream(&self, capability: &str, parameters: Value) -> aegis_adapters::Result<InvokeStream> {
        let entry = self.find_capability(capability)?;
        let url = format!("{}{}", self.config.base_url, entry.path);
        let request = self.apply_auth(self.client.post(&url).json(&parameters));

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_response_status(status, body));
        }

        Ok(Box::pin(sse_chunk_stream(response)))
    }

    async fn health(&self) -> HealthStatus {
        let request = self.apply_auth(self.client.head(&self.config.base_url));
        match request.send().await {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => HealthStatus::Healthy,
            _ => HealthStatus::Unhealthy,
        }
    }

    async fn close(&self) {}
}

fn sse_chunk_stream(response: reqwest::Response) -> impl tokio_stream::Stream<Item = aegis_adapters::Result<InvokeChunk>> {
    async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        if data == "[DONE]" {
                            yield Ok(InvokeChunk { delta: String::new(), done: true });
                            return;
                        }
                        yield Ok(InvokeChunk { delta: data, done: false });
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            yield Ok(InvokeChunk { delta: data, done: false });
                        }
                    }
                    yield Ok(InvokeChunk { delta: String::new(), done: true });
                    break;
                }
                Err(e) => {
                    yield Err(AdapterError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_5xx_as_server_error() {
        let err = HttpAdapter::classify_response_status(
            reqwest::StatusCode::BAD_GATEWAY,
            "upstream down".into(),
        );
        assert!(matches!(err, AdapterError::ServerError(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn classifies_4xx_as_client_error_not_retryable() {
        let err = HttpAdapter::classify_response_status(
            reqwest::StatusCode::FORBIDDEN,
            "denied".into(),
        );
        assert!(matches!(err, AdapterError::ClientError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unknown_capability_errors_before_any_request() {
        let adapter = HttpAdapter::new("http:test", HttpResourceConfig::default()).unwrap();
        assert!(adapter.find_capability("missing").is_err());
    }
}
