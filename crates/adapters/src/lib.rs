//! The protocol-agnostic seam the dispatcher calls through: every
//! transport crate (stdio, HTTP, gRPC) implements [`Adapter`] and registers
//! its resources in an [`AdapterRegistry`].

pub mod adapter;
pub mod capability;
pub mod error;
pub mod registry;

pub use adapter::{Adapter, InvokeStream};
pub use capability::{CapabilityDef, InvokeChunk, InvokeContent, InvokeResult};
pub use error::{AdapterError, Result};
pub use registry::AdapterRegistry;
