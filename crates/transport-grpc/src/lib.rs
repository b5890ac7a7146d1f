//! Adapter for backends reachable over gRPC: one channel per resource,
//! reflection-based capability discovery, and the four call kinds.

pub mod adapter;
pub mod credentials;
pub mod reflection;

pub mod pb {
    tonic::include_proto!("aegis.invoke.v1");
}

pub use adapter::{GrpcAdapter, GrpcResourceConfig};
pub use credentials::GrpcCredentials;
