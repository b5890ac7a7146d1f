//! Core request-scoped entities: the shapes that flow through the
//! authorization service, the dispatcher, and the audit pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The caller's identity after credential validation. Per-request; never
/// persisted beyond the lifetime of the invocation it authenticates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub teams: BTreeSet<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub ip: String,
    #[serde(default = "default_trust")]
    pub trust_level: String,
}

fn default_trust() -> String {
    "standard".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Stdio,
    Http,
    Grpc,
    /// Agent-to-agent capability calls, not routed through an adapter.
    A2a,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Stdio => "stdio",
            Protocol::Http => "http",
            Protocol::Grpc => "grpc",
            Protocol::A2a => "a2a",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityTier {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

/// What is being acted on: a `(protocol, server_handle)` pair resolves to
/// exactly one adapter-reachable endpoint; `capability` names the callable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub protocol: Protocol,
    pub server_handle: String,
    pub capability: String,
    pub sensitivity: SensitivityTier,
    pub owning_team: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl Target {
    /// `(protocol, server_handle)` identifies the adapter resource this
    /// target resolves to.
    pub fn resource_key(&self) -> String {
        format!("{}:{}", self.protocol.as_str(), self.server_handle)
    }
}

/// A stable hash over the canonicalized policy input. See
/// [`crate::fingerprint::fingerprint`] for how it is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The policy engine's output for one `(principal, target, action)` tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_parameters: Option<serde_json::Value>,
    pub cache_ttl_secs: u64,
    #[serde(skip)]
    pub fingerprint: Option<Fingerprint>,
    /// Engine-flagged hint that a deny decision is stable and need not be
    /// clamped to the short negative-caching bound.
    #[serde(default)]
    pub stable: bool,
    /// When set, the reason is redacted before it reaches the caller; the
    /// unredacted reason is retained only in the audit record.
    #[serde(default)]
    pub reason_sensitive: bool,
}

impl Decision {
    pub fn caller_facing_reason(&self) -> &str {
        if self.reason_sensitive {
            "reason redacted by policy"
        } else {
            &self.reason
        }
    }

    pub fn synthetic_deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            filtered_parameters: None,
            cache_ttl_secs: 0,
            fingerprint: None,
            stable: false,
            reason_sensitive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// An adapter's handle to a single backend. Transport-specific configuration
/// is opaque to everything but the adapter that owns this resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResource {
    pub resource_id: String,
    pub protocol: Protocol,
    pub health: HealthStatus,
    pub last_healthy_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Error,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Authorization,
    Invocation,
}

/// A terminal, append-only record for one request. Once constructed and
/// handed to the audit pipeline, an `AuditEvent` is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: u64,
    pub kind: AuditEventKind,
    pub principal_id: String,
    pub source_ip: String,
    pub target_protocol: Protocol,
    pub target_server: String,
    pub target_capability: String,
    pub allow: Option<bool>,
    pub reason: Option<String>,
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub filtered: bool,
    #[serde(default)]
    pub context: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_key_combines_protocol_and_handle() {
        let target = Target {
            protocol: Protocol::Http,
            server_handle: "fs-1".into(),
            capability: "read_file".into(),
            sensitivity: SensitivityTier::Low,
            owning_team: "platform".into(),
            visibility: Visibility::Internal,
            parameters: serde_json::json!({}),
        };
        assert_eq!(target.resource_key(), "http:fs-1");
    }

    #[test]
    fn caller_facing_reason_redacts_when_flagged() {
        let mut decision = Decision::synthetic_deny("viewer cannot invoke critical tools");
        assert_eq!(
            decision.caller_facing_reason(),
            "viewer cannot invoke critical tools"
        );
        decision.reason_sensitive = true;
        assert_eq!(decision.caller_facing_reason(), "reason redacted by policy");
    }

    #[test]
    fn fingerprint_hex_roundtrips_length() {
        let fp = Fingerprint([7u8; 32]);
        assert_eq!(fp.to_hex().len(), 64);
    }
}
