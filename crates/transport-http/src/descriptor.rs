use serde::Deserialize;

use aegis_adapters::CapabilityDef;

/// The discovery document an HTTP backend serves at its configured
/// discovery URL, listing each capability as a `(method, path)` pair plus
/// the usual name/description/schema triple.
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorDocument {
    pub capabilities: Vec<CapabilityEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default = "default_schema")]
    pub input_schema: serde_json::Value,
}

fn default_method() -> String {
    "POST".into()
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl From<&CapabilityEntry> for CapabilityDef {
    fn from(entry: &CapabilityEntry) -> Self {
        CapabilityDef {
            name: entry.name.clone(),
            description: entry.description.clone(),
            input_schema: entry.input_schema.clone(),
        }
    }
}
