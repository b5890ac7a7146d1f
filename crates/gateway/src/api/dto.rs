//! Wire-facing request/response shapes for the inbound API. Kept separate
//! from the domain entities they build because the wire format is allowed
//! to omit fields (e.g. `action` defaults to `"invoke"`) that the domain
//! types require explicitly.

use serde::{Deserialize, Serialize};

use aegis_domain::entities::{Principal, Protocol, SensitivityTier, Target, Visibility};

#[derive(Debug, Deserialize)]
pub struct PrincipalDescriptor {
    pub id: String,
    #[serde(default)]
    pub roles: std::collections::BTreeSet<String>,
    #[serde(default)]
    pub teams: std::collections::BTreeSet<String>,
    #[serde(default)]
    pub scopes: std::collections::BTreeSet<String>,
    #[serde(default)]
    pub trust_level: Option<String>,
}

impl PrincipalDescriptor {
    pub fn into_principal(self, source_ip: String) -> Principal {
        Principal {
            id: self.id,
            roles: self.roles,
            teams: self.teams,
            scopes: self.scopes,
            ip: source_ip,
            trust_level: self.trust_level.unwrap_or_else(|| "standard".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetDescriptor {
    pub protocol: Protocol,
    pub server_handle: String,
    pub capability: String,
    #[serde(default = "d_sensitivity")]
    pub sensitivity: SensitivityTier,
    #[serde(default)]
    pub owning_team: String,
    #[serde(default = "d_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

fn d_sensitivity() -> SensitivityTier {
    SensitivityTier::Medium
}
fn d_visibility() -> Visibility {
    Visibility::Internal
}

impl TargetDescriptor {
    pub fn into_target(self) -> Target {
        Target {
            protocol: self.protocol,
            server_handle: self.server_handle,
            capability: self.capability,
            sensitivity: self.sensitivity,
            owning_team: self.owning_team,
            visibility: self.visibility,
            parameters: self.parameters,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub principal: PrincipalDescriptor,
    #[serde(default = "d_action")]
    pub action: String,
    pub target: TargetDescriptor,
}

fn d_action() -> String {
    "invoke".into()
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allow: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_parameters: Option<serde_json::Value>,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct A2aAuthorizeRequest {
    pub source_agent: String,
    pub target_agent: String,
    pub capability: String,
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub principal: PrincipalDescriptor,
    pub target: TargetDescriptor,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub content: Vec<InvokeContentDto>,
    pub is_error: bool,
    pub filtered: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct InvokeContentDto {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_descriptor_defaults_trust_level() {
        let raw = r#"{"id":"svc-a"}"#;
        let descriptor: PrincipalDescriptor = serde_json::from_str(raw).unwrap();
        let principal = descriptor.into_principal("10.0.0.5".into());
        assert_eq!(principal.id, "svc-a");
        assert_eq!(principal.trust_level, "standard");
        assert_eq!(principal.ip, "10.0.0.5");
        assert!(principal.roles.is_empty());
    }

    #[test]
    fn target_descriptor_applies_defaults() {
        let raw = r#"{"protocol":"http","server_handle":"search-1","capability":"search.query"}"#;
        let descriptor: TargetDescriptor = serde_json::from_str(raw).unwrap();
        let target = descriptor.into_target();
        assert_eq!(target.sensitivity, SensitivityTier::Medium);
        assert!(matches!(target.visibility, Visibility::Internal));
        assert_eq!(target.resource_key(), "http:search-1");
    }

    #[test]
    fn authorize_request_defaults_action_to_invoke() {
        let raw = r#"{
            "principal": {"id": "svc-a"},
            "target": {"protocol": "stdio", "server_handle": "fs-1", "capability": "fs.read"}
        }"#;
        let request: AuthorizeRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.action, "invoke");
    }
}
