use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One callable surfaced by a backend's discovery response, normalized
/// across protocols (MCP `tools/list`, an HTTP descriptor document, or a
/// gRPC reflection listing all funnel down to this shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// A single content chunk returned by an invocation, mirroring the
/// content-block shape most tool-call wire formats converge on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResult {
    pub content: Vec<InvokeContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl InvokeResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![InvokeContent {
                content_type: "text".into(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![InvokeContent {
                content_type: "text".into(),
                text: text.into(),
            }],
            is_error: true,
        }
    }
}

/// One chunk of a streamed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeChunk {
    pub delta: String,
    pub done: bool,
}
