//! Request router — resolve, authorize, validate, invoke, wrap.
//!
//! Every operation returns the uniform [`HostResponse`] envelope; the
//! router itself never raises. Domain handler failures, deadline expiry,
//! and bridge faults all become `EXECUTION_ERROR` envelopes.

use crate::capability::{PromptSpec, ResourceSpec, ToolSpec};
use crate::protocol::CallMeta;
use crate::registry::{CapabilityRegistry, PromptBackend, ResourceBackend, ToolBackend};
use crate::validate::validate_input;
use campus_auth::{missing_scopes, Session};
use campus_core::{CampusError, ErrorCode, HostResponse, ResponseMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Routes caller requests to the owning domain, gated by scope checks.
pub struct Router {
    registry: Arc<CapabilityRegistry>,
    call_deadline: Duration,
}

impl Router {
    pub fn new(registry: Arc<CapabilityRegistry>, call_deadline: Duration) -> Self {
        Self {
            registry,
            call_deadline,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Execute a tool on behalf of a session.
    pub async fn execute_tool(
        &self,
        name: &str,
        input: serde_json::Value,
        session: &Session,
    ) -> HostResponse {
        if let Some(resp) = guard_session(session) {
            return resp;
        }
        if let Some(resp) = guard_tenant(&input, session) {
            return resp;
        }

        let Some(resolved) = self.registry.find_tool(name).await else {
            return HostResponse::err(ErrorCode::ToolNotFound, format!("Tool not found: {name}"));
        };

        let missing = missing_scopes(&session.scopes, &resolved.spec.required_scopes);
        if !missing.is_empty() {
            warn!(
                tool = %name,
                user_id = %session.user_id,
                missing = ?missing,
                "Scope check failed for tool call"
            );
            return forbidden(&missing);
        }

        if let Err(violations) = validate_input(&resolved.spec.input_schema, &input) {
            return HostResponse::err_with_details(
                ErrorCode::InvalidInput,
                "Input validation failed",
                serde_json::json!(violations),
            );
        }

        info!(
            tool = %name,
            server = %resolved.server,
            user_id = %session.user_id,
            tenant_id = %session.tenant_id,
            "Routing tool call"
        );

        let started = Instant::now();
        let outcome = match resolved.backend {
            ToolBackend::Local(handler) => {
                match tokio::time::timeout(self.call_deadline, handler.call(input, session)).await {
                    Ok(result) => result,
                    Err(_) => Err(CampusError::Handler(format!(
                        "Tool '{}' exceeded deadline of {}ms",
                        name,
                        self.call_deadline.as_millis()
                    ))),
                }
            }
            ToolBackend::Remote(client) => {
                client
                    .call_tool(name, input, CallMeta::from(session), Some(self.call_deadline))
                    .await
            }
        };

        wrap(outcome, &resolved.server, started)
    }

    /// Read a resource on behalf of a session. Query parameters are
    /// untyped strings; no schema validation applies.
    pub async fn fetch_resource(
        &self,
        uri: &str,
        session: &Session,
        params: &HashMap<String, String>,
    ) -> HostResponse {
        if let Some(resp) = guard_session(session) {
            return resp;
        }

        let Some(resolved) = self.registry.find_resource(uri).await else {
            return HostResponse::err(
                ErrorCode::ResourceNotFound,
                format!("Resource not found: {uri}"),
            );
        };

        let missing = missing_scopes(&session.scopes, &resolved.spec.required_scopes);
        if !missing.is_empty() {
            warn!(
                uri = %uri,
                user_id = %session.user_id,
                missing = ?missing,
                "Scope check failed for resource fetch"
            );
            return forbidden(&missing);
        }

        info!(
            uri = %uri,
            server = %resolved.server,
            user_id = %session.user_id,
            "Routing resource fetch"
        );

        let started = Instant::now();
        let outcome = match resolved.backend {
            ResourceBackend::Local(handler) => {
                let mime_type = resolved.spec.mime_type.clone();
                match tokio::time::timeout(self.call_deadline, handler.read(session, params)).await
                {
                    Ok(Ok(content)) => Ok(serde_json::json!({
                        "uri": uri,
                        "mime_type": mime_type,
                        "content": content,
                    })),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(CampusError::Handler(format!(
                        "Resource '{}' exceeded deadline of {}ms",
                        uri,
                        self.call_deadline.as_millis()
                    ))),
                }
            }
            ResourceBackend::Remote(client) => {
                client
                    .read_resource(uri, params, CallMeta::from(session), Some(self.call_deadline))
                    .await
            }
        };

        wrap(outcome, &resolved.server, started)
    }

    /// Fetch a prompt template on behalf of a session. Substitution of
    /// `{{variable}}` placeholders is the caller's responsibility.
    pub async fn get_prompt(&self, name: &str, session: &Session) -> HostResponse {
        if let Some(resp) = guard_session(session) {
            return resp;
        }

        let Some(resolved) = self.registry.find_prompt(name).await else {
            // The taxonomy has no prompt-specific code; prompts are
            // addressed state like resources.
            return HostResponse::err(
                ErrorCode::ResourceNotFound,
                format!("Prompt not found: {name}"),
            );
        };

        let missing = missing_scopes(&session.scopes, &resolved.spec.required_scopes);
        if !missing.is_empty() {
            return forbidden(&missing);
        }

        let started = Instant::now();
        let outcome = match resolved.backend {
            PromptBackend::Local => Ok(serde_json::json!({
                "name": resolved.spec.name,
                "description": resolved.spec.description,
                "template": resolved.spec.template,
                "variables": resolved.spec.variables,
            })),
            PromptBackend::Remote(client) => {
                client
                    .get_prompt(name, CallMeta::from(session), Some(self.call_deadline))
                    .await
            }
        };

        wrap(outcome, &resolved.server, started)
    }

    /// The authorization-aware tool catalog for this session.
    pub async fn list_tools(&self, session: &Session) -> Vec<ToolSpec> {
        self.registry.list_tools(session).await
    }

    /// The authorization-aware resource catalog for this session.
    pub async fn list_resources(&self, session: &Session) -> Vec<ResourceSpec> {
        self.registry.list_resources(session).await
    }

    /// The authorization-aware prompt catalog for this session.
    pub async fn list_prompts(&self, session: &Session) -> Vec<PromptSpec> {
        self.registry.list_prompts(session).await
    }
}

fn guard_session(session: &Session) -> Option<HostResponse> {
    if session.is_expired() {
        return Some(HostResponse::err(
            ErrorCode::SessionExpired,
            format!("Session {} has expired", session.id),
        ));
    }
    None
}

/// A tool input naming a tenant other than the session's own is rejected
/// before any handler runs.
fn guard_tenant(input: &serde_json::Value, session: &Session) -> Option<HostResponse> {
    match input.get("tenant_id").and_then(|v| v.as_str()) {
        Some(tenant) if tenant != session.tenant_id => Some(HostResponse::err(
            ErrorCode::TenantMismatch,
            format!(
                "Request tenant '{}' does not match session tenant '{}'",
                tenant, session.tenant_id
            ),
        )),
        _ => None,
    }
}

fn forbidden(missing: &[String]) -> HostResponse {
    HostResponse::err(
        ErrorCode::Forbidden,
        format!("Insufficient scopes. Required: {}", missing.join(", ")),
    )
}

fn wrap(
    outcome: campus_core::CampusResult<serde_json::Value>,
    server: &str,
    started: Instant,
) -> HostResponse {
    match outcome {
        Ok(data) => HostResponse::ok(
            data,
            ResponseMetadata {
                server: server.to_string(),
                execution_time_ms: started.elapsed().as_millis() as u64,
            },
        ),
        Err(e) => {
            warn!(server = %server, error = %e, "Handler execution failed");
            HostResponse::err(ErrorCode::ExecutionError, failure_message(e))
        }
    }
}

/// Handlers "throw" with their own message; surface it verbatim rather
/// than prefixed with the subsystem label.
fn failure_message(e: CampusError) -> String {
    match e {
        CampusError::Handler(message) => message,
        other => other.to_string(),
    }
}
