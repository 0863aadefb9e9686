//! Capability descriptors for in-process domain servers.
//!
//! A domain server groups tools, resources, and prompt templates under one
//! scope prefix. In-process domains register descriptor tables directly;
//! process-backed domains declare the same shapes over the wire (see
//! [`crate::protocol`]).

use async_trait::async_trait;
use campus_auth::Session;
use campus_core::CampusResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Executable side of a tool: already-validated input plus the caller's
/// session. Errors become `EXECUTION_ERROR` envelopes at the router.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: serde_json::Value, session: &Session)
        -> CampusResult<serde_json::Value>;
}

/// Readable side of a resource: session plus untyped query parameters.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(
        &self,
        session: &Session,
        params: &HashMap<String, String>,
    ) -> CampusResult<serde_json::Value>;
}

/// Adapter for plain synchronous functions as tool handlers.
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(serde_json::Value, &Session) -> CampusResult<serde_json::Value> + Send + Sync,
{
    async fn call(
        &self,
        input: serde_json::Value,
        session: &Session,
    ) -> CampusResult<serde_json::Value> {
        (self.0)(input, session)
    }
}

/// Adapter for plain synchronous functions as resource handlers.
pub struct FnResource<F>(pub F);

#[async_trait]
impl<F> ResourceHandler for FnResource<F>
where
    F: Fn(&Session, &HashMap<String, String>) -> CampusResult<serde_json::Value> + Send + Sync,
{
    async fn read(
        &self,
        session: &Session,
        params: &HashMap<String, String>,
    ) -> CampusResult<serde_json::Value> {
        (self.0)(session, params)
    }
}

/// Declared interface of a tool: name, JSON Schema input shape, and the
/// scopes a session must satisfy to execute it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
    /// Empty means public: any session may execute.
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

pub(crate) fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Declared interface of a URI-addressed resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

pub(crate) fn default_mime_type() -> String {
    "application/json".to_string()
}

/// A reusable prompt template with `{{variable}}` placeholders.
/// Substitution is the caller's responsibility, not the host's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

/// A registered in-process tool: declared spec plus its handler.
pub struct LocalTool {
    pub spec: ToolSpec,
    pub handler: Arc<dyn ToolHandler>,
}

/// A registered in-process resource: declared spec plus its handler.
pub struct LocalResource {
    pub spec: ResourceSpec,
    pub handler: Arc<dyn ResourceHandler>,
}

/// An in-process domain server: a descriptor table under one scope prefix.
pub struct LocalDomain {
    pub name: String,
    pub version: String,
    pub scope_prefix: String,
    pub(crate) tools: Vec<LocalTool>,
    pub(crate) resources: Vec<LocalResource>,
    pub(crate) prompts: Vec<PromptSpec>,
}

impl LocalDomain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        scope_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            scope_prefix: scope_prefix.into(),
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
        }
    }

    /// Register a tool. Bare names are prefixed with the domain's scope
    /// prefix (`"issue_invoice"` in the `finance` domain becomes
    /// `"finance:issue_invoice"`), matching the platform naming convention.
    pub fn tool(
        mut self,
        name: &str,
        description: &str,
        input_schema: serde_json::Value,
        required_scopes: &[&str],
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        let name = self.qualify(name);
        self.tools.push(LocalTool {
            spec: ToolSpec {
                name,
                description: description.to_string(),
                input_schema,
                required_scopes: owned(required_scopes),
            },
            handler,
        });
        self
    }

    /// Register a resource under an explicit URI.
    pub fn resource(
        mut self,
        uri: &str,
        name: &str,
        description: &str,
        required_scopes: &[&str],
        handler: Arc<dyn ResourceHandler>,
    ) -> Self {
        self.resources.push(LocalResource {
            spec: ResourceSpec {
                uri: uri.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                mime_type: default_mime_type(),
                required_scopes: owned(required_scopes),
            },
            handler,
        });
        self
    }

    /// Register a prompt template. Bare names get the domain prefix.
    pub fn prompt(
        mut self,
        name: &str,
        description: &str,
        template: &str,
        variables: &[&str],
        required_scopes: &[&str],
    ) -> Self {
        let name = self.qualify(name);
        self.prompts.push(PromptSpec {
            name,
            description: description.to_string(),
            template: template.to_string(),
            variables: owned(variables),
            required_scopes: owned(required_scopes),
        });
        self
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    fn qualify(&self, name: &str) -> String {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{}:{}", self.scope_prefix, name)
        }
    }
}

fn owned(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn echo_handler() -> Arc<dyn ToolHandler> {
        Arc::new(FnTool(|input: serde_json::Value, _session: &Session| Ok(input)))
    }

    #[test]
    fn test_bare_tool_names_get_domain_prefix() {
        let domain = LocalDomain::new("finance", "1.0.0", "finance").tool(
            "issue_invoice",
            "Generate an invoice",
            default_input_schema(),
            &["finance:write"],
            echo_handler(),
        );
        assert_eq!(domain.tools[0].spec.name, "finance:issue_invoice");
    }

    #[test]
    fn test_qualified_names_kept_verbatim() {
        let domain = LocalDomain::new("finance", "1.0.0", "finance").tool(
            "finance:apply_discount",
            "Apply a discount code",
            default_input_schema(),
            &[],
            echo_handler(),
        );
        assert_eq!(domain.tools[0].spec.name, "finance:apply_discount");
        assert!(domain.tools[0].spec.required_scopes.is_empty());
    }

    #[test]
    fn test_tool_spec_defaults_on_deserialize() {
        let spec: ToolSpec = serde_json::from_str(r#"{"name":"ops:list_rooms"}"#).unwrap();
        assert_eq!(spec.input_schema["type"], "object");
        assert!(spec.required_scopes.is_empty());
    }
}
