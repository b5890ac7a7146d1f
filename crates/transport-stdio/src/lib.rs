//! Adapter for backends that speak line-delimited JSON-RPC over a child
//! process's stdin/stdout: process lifecycle, request correlation, and a
//! health loop with auto-restart.

pub mod adapter;
pub mod correlation;
pub mod env_guard;
pub mod health;
pub mod process;
pub mod protocol;
pub mod state;

pub use adapter::StdioAdapter;
pub use process::{ManagedProcess, ProcessError, SpawnSpec};
pub use state::ProcessState;
