//! Static topology of backend resources the dispatcher can reach, loaded
//! from a side config file separate from the main runtime config. Kept
//! small and declarative: constructing the live `Adapter` for each entry
//! (spawning a subprocess, opening a gRPC channel) happens in `main`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use aegis_transport_grpc::GrpcCredentials;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ResourceDef {
    Stdio {
        id: String,
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Http {
        id: String,
        base_url: String,
        discovery_url: String,
        #[serde(default)]
        bearer_token: Option<String>,
    },
    Grpc {
        id: String,
        endpoint: String,
        #[serde(default)]
        bearer_token: Option<String>,
        #[serde(default = "d_reflection")]
        reflection_enabled: bool,
    },
}

fn d_reflection() -> bool {
    true
}

impl ResourceDef {
    pub fn id(&self) -> &str {
        match self {
            ResourceDef::Stdio { id, .. } => id,
            ResourceDef::Http { id, .. } => id,
            ResourceDef::Grpc { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesFile {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDef>,
}

impl ResourcesFile {
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to parse resources file, starting with none registered");
                    ResourcesFile::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "no resources file found, starting with none registered");
                ResourcesFile::default()
            }
        }
    }
}

pub fn grpc_credentials(bearer_token: &Option<String>) -> GrpcCredentials {
    match bearer_token {
        Some(token) => GrpcCredentials::BearerToken(token.clone()),
        None => GrpcCredentials::None,
    }
}
