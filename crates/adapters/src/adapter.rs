//! The common seam every transport (stdio, HTTP, gRPC) implements so the
//! dispatcher never has to branch on protocol.

use async_trait::async_trait;
use serde_json::Value;
use tokio_stream::Stream;
use std::pin::Pin;

use aegis_domain::entities::HealthStatus;

use crate::capability::{CapabilityDef, InvokeChunk, InvokeResult};
use crate::error::Result;

pub type InvokeStream = Pin<Box<dyn Stream<Item = Result<InvokeChunk>> + Send>>;

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable identifier for this backend resource, e.g. `stdio:fs-1`.
    fn resource_id(&self) -> &str;

    /// Refresh and return the capability list this backend currently
    /// advertises. Adapters are free to cache internally; callers should
    /// not assume this is cheap.
    async fn discover(&self) -> Result<Vec<CapabilityDef>>;

    /// Last-known capability list without forcing a refresh.
    fn list_capabilities(&self) -> Vec<CapabilityDef>;

    async fn invoke(&self, capability: &str, parameters: Value) -> Result<InvokeResult>;

    async fn invoke_stream(&self, capability: &str, parameters: Value) -> Result<InvokeStream>;

    async fn health(&self) -> HealthStatus;

    async fn close(&self);
}
