use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};

use aegis_adapters::AdapterRegistry;
use aegis_audit::AuditHandle;
use aegis_authz::AuthzService;
use aegis_domain::config::Config;
use aegis_resilience::{RetryPolicy, TimeoutPolicy};

use crate::rate_limit::RateLimiter;
use crate::resource_guard::ResourceGuardPool;

/// Shared, cheaply-cloneable application state threaded through every axum
/// handler. Everything mutable lives behind its own internal lock; cloning
/// `AppState` only copies `Arc` pointers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<AdapterRegistry>,
    pub authz: Arc<AuthzService>,
    pub audit: AuditHandle,
    pub rate_limiter: Arc<RateLimiter>,
    pub resource_guards: Arc<ResourceGuardPool>,
    pub adapter_retry: Arc<RetryPolicy<aegis_adapters::AdapterError>>,
    pub adapter_timeout: TimeoutPolicy,
    pub api_token_hash: Option<[u8; 32]>,
    pub admin_token_hash: Option<[u8; 32]>,
    pub started_at: Instant,
}

pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}
