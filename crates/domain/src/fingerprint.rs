//! Deterministic fingerprinting of policy inputs.
//!
//! A fingerprint is a SHA-256 hash over a canonical serialization of
//! `(principal.id, sorted roles, action, target.protocol, target.server,
//! target.capability, normalized parameters)`. Canonicalization sorts object
//! keys recursively and formats floats via their shortest round-tripping
//! decimal representation, so `1.0` and `1.00` — and any two JSON trees that
//! are semantically equal but differ in key order — fingerprint identically.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::entities::{Fingerprint, Protocol};

pub struct FingerprintInput<'a> {
    pub principal_id: &'a str,
    pub roles: &'a BTreeSet<String>,
    pub action: &'a str,
    pub protocol: Protocol,
    pub server_handle: &'a str,
    pub capability: &'a str,
    pub parameters: &'a serde_json::Value,
}

pub fn fingerprint(input: FingerprintInput<'_>) -> Fingerprint {
    let normalized = normalize(input.parameters);
    let canonical = canonicalize(&normalized);

    let mut hasher = Sha256::new();
    hasher.update(input.principal_id.as_bytes());
    hasher.update(b"\x00");
    for role in input.roles {
        hasher.update(role.as_bytes());
        hasher.update(b"\x00");
    }
    hasher.update(b"\x00");
    hasher.update(input.action.as_bytes());
    hasher.update(b"\x00");
    hasher.update(input.protocol.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(input.server_handle.as_bytes());
    hasher.update(b"\x00");
    hasher.update(input.capability.as_bytes());
    hasher.update(b"\x00");
    hasher.update(canonical.as_bytes());

    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Fingerprint(bytes)
}

/// Agent-to-agent fingerprint input: no transport protocol is involved, so
/// this does not reuse [`FingerprintInput`], which is keyed on one.
pub struct A2aFingerprintInput<'a> {
    pub source_agent: &'a str,
    pub target_agent: &'a str,
    pub capability: &'a str,
    pub parameters: &'a serde_json::Value,
}

pub fn fingerprint_a2a(input: A2aFingerprintInput<'_>) -> Fingerprint {
    let normalized = normalize(input.parameters);
    let canonical = canonicalize(&normalized);

    let mut hasher = Sha256::new();
    hasher.update(b"a2a\x00");
    hasher.update(input.source_agent.as_bytes());
    hasher.update(b"\x00");
    hasher.update(input.target_agent.as_bytes());
    hasher.update(b"\x00");
    hasher.update(input.capability.as_bytes());
    hasher.update(b"\x00");
    hasher.update(canonical.as_bytes());

    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Fingerprint(bytes)
}

/// Empty parameters (null or missing) normalize to a canonical empty object.
fn normalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Null => serde_json::json!({}),
        other => other.clone(),
    }
}

/// Sorted-key, shortest-float-representation canonical JSON serialization —
/// a JCS-like scheme. `serde_json` already emits the shortest round-tripping
/// float representation and treats `Map` (a `BTreeMap` under the
/// `preserve_order` feature being disabled) in sorted key order, so a plain
/// `to_string` over a re-parsed tree is canonical here.
fn canonicalize(value: &serde_json::Value) -> String {
    fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut sorted = std::collections::BTreeMap::new();
                for (k, v) in map {
                    sorted.insert(k.clone(), sort_keys(v));
                }
                serde_json::Value::Object(sorted.into_iter().collect())
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(sort_keys).collect())
            }
            other => other.clone(),
        }
    }
    serde_json::to_string(&sort_keys(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input(params: serde_json::Value) -> FingerprintInput<'static> {
        // Leaked statics are fine in tests; the lifetime is for the test only.
        let roles: &'static BTreeSet<String> =
            Box::leak(Box::new(BTreeSet::from(["developer".to_string()])));
        let params: &'static serde_json::Value = Box::leak(Box::new(params));
        FingerprintInput {
            principal_id: "alice",
            roles,
            action: "invoke",
            protocol: Protocol::Http,
            server_handle: "fs-1",
            capability: "read_file",
            parameters: params,
        }
    }

    #[test]
    fn equal_tuples_fingerprint_equal() {
        let a = fingerprint(sample_input(serde_json::json!({"path": "/tmp/a", "n": 1.0})));
        let b = fingerprint(sample_input(serde_json::json!({"n": 1.00, "path": "/tmp/a"})));
        assert_eq!(a, b);
    }

    #[test]
    fn different_parameters_fingerprint_differently() {
        let a = fingerprint(sample_input(serde_json::json!({"path": "/tmp/a"})));
        let b = fingerprint(sample_input(serde_json::json!({"path": "/tmp/b"})));
        assert_ne!(a, b);
    }

    #[test]
    fn null_and_empty_object_fingerprint_identically() {
        let a = fingerprint(sample_input(serde_json::Value::Null));
        let b = fingerprint(sample_input(serde_json::json!({})));
        assert_eq!(a, b);
    }

    #[test]
    fn a2a_fingerprint_differs_from_transport_fingerprint() {
        let params = serde_json::json!({"k": "v"});
        let a2a = fingerprint_a2a(A2aFingerprintInput {
            source_agent: "alice",
            target_agent: "fs-1",
            capability: "read_file",
            parameters: &params,
        });
        let transport = fingerprint(sample_input(params));
        assert_ne!(a2a, transport);
    }
}
