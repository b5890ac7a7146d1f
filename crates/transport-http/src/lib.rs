//! Adapter for backends reachable over plain HTTP, including SSE-streamed
//! invocations.

pub mod adapter;
pub mod descriptor;
mod sse;

pub use adapter::{HttpAdapter, HttpResourceConfig};
pub use descriptor::{CapabilityEntry, DescriptorDocument};
