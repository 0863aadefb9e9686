//! Wire protocol for process-backed domain servers.
//!
//! Line-delimited JSON-RPC 2.0 over the child's stdio. Every routed call
//! carries the session identity as a `meta` field; the remote is trusted
//! to re-check scopes if it wants, but the host router is the
//! authoritative gate.

use campus_auth::{Role, Session};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Method names accepted by domain servers.
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const CALL_TOOL: &str = "call-tool";
    pub const READ_RESOURCE: &str = "read-resource";
    pub const GET_PROMPT: &str = "get-prompt";
    pub const LIST_TOOLS: &str = "list-tools";
    pub const LIST_RESOURCES: &str = "list-resources";
    pub const LIST_PROMPTS: &str = "list-prompts";
    pub const PING: &str = "ping";
}

/// Session identity attached to every routed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMeta {
    pub tenant_id: String,
    pub user_id: String,
    pub role: Role,
    pub scopes: Vec<String>,
}

impl From<&Session> for CallMeta {
    fn from(session: &Session) -> Self {
        Self {
            tenant_id: session.tenant_id.clone(),
            user_id: session.user_id.clone(),
            role: session.role,
            scopes: session.scopes.clone(),
        }
    }
}

/// JSON-RPC 2.0 request envelope with the host's `meta` extension.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<CallMeta>,
}

impl RpcRequest {
    pub fn new(
        id: u64,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        meta: Option<CallMeta>,
    ) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
            meta,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Capability flags declared during the `initialize` handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclaredCapabilities {
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub resources: bool,
    #[serde(default)]
    pub prompts: bool,
}

/// Result of the `initialize` handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub capabilities: DeclaredCapabilities,
}

/// Tool declared by a remote domain via `list-tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "crate::capability::default_input_schema")]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

/// Resource declared by a remote domain via `list-resources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResource {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "crate::capability::default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

/// Prompt declared by a remote domain via `list-prompts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePrompt {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

/// Parameters of a `call-tool` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Parameters of a `read-resource` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_meta() {
        let meta = CallMeta {
            tenant_id: "t-1".into(),
            user_id: "u-1".into(),
            role: Role::AdminSales,
            scopes: vec!["finance:*".into()],
        };
        let req = RpcRequest::new(
            7,
            method::CALL_TOOL,
            Some(serde_json::json!({"name": "finance:issue_invoice", "arguments": {}})),
            Some(meta),
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "call-tool");
        assert_eq!(json["meta"]["tenant_id"], "t-1");
        assert_eq!(json["meta"]["role"], "admin_sales");
        assert_eq!(json["meta"]["scopes"][0], "finance:*");
    }

    #[test]
    fn test_request_without_params_omits_fields() {
        let req = RpcRequest::new(1, method::PING, None, None);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("params").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_response_parse() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#;
        let resp: RpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, Some(1));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_error_parse() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Unknown method"}}"#;
        let resp: RpcResponse = serde_json::from_str(json).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Unknown method");
        assert!(err.data.is_none());
    }

    #[test]
    fn test_initialize_result_defaults() {
        let result: InitializeResult =
            serde_json::from_str(r#"{"name":"attendance-server"}"#).unwrap();
        assert_eq!(result.name, "attendance-server");
        assert!(!result.capabilities.tools);
    }

    #[test]
    fn test_remote_tool_defaults() {
        let tool: RemoteTool =
            serde_json::from_str(r#"{"name":"attendance:mark_register"}"#).unwrap();
        assert_eq!(tool.input_schema["type"], "object");
        assert!(tool.required_scopes.is_empty());
    }
}
