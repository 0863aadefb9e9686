//! Capability registry — one entry per scope prefix, each either an
//! in-process descriptor table or a live process-backed connection.
//!
//! The table is mutated only during registration and shutdown; steady-state
//! traffic performs read-only lookups. Registration order is preserved so
//! lookup shadowing is deterministic (first match wins).

use crate::bridge::{reconnect_with_backoff, BridgeClient, ProcessServerConfig};
use crate::capability::{LocalDomain, PromptSpec, ResourceHandler, ResourceSpec, ToolHandler, ToolSpec};
use crate::protocol::{InitializeResult, RemotePrompt, RemoteResource, RemoteTool};
use campus_auth::{has_scope, Session};
use campus_core::{CampusError, CampusResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// A registered process-backed domain.
pub struct ProcessDomain {
    pub config: ProcessServerConfig,
    pub client: Arc<BridgeClient>,
    pub info: InitializeResult,
    pub connected_at: DateTime<Utc>,
    pub restart_count: usize,
}

/// A registered domain server, either variant.
pub enum DomainServer {
    Local(LocalDomain),
    Process(ProcessDomain),
}

impl DomainServer {
    fn name(&self) -> &str {
        match self {
            DomainServer::Local(d) => &d.name,
            DomainServer::Process(p) => &p.config.name,
        }
    }
}

struct Entry {
    prefix: String,
    server: DomainServer,
}

/// How a resolved tool is invoked.
pub enum ToolBackend {
    Local(Arc<dyn ToolHandler>),
    Remote(Arc<BridgeClient>),
}

/// A tool resolved to its owning domain.
pub struct ResolvedTool {
    pub server: String,
    pub spec: ToolSpec,
    pub backend: ToolBackend,
}

/// How a resolved resource is read.
pub enum ResourceBackend {
    Local(Arc<dyn ResourceHandler>),
    Remote(Arc<BridgeClient>),
}

/// A resource resolved to its owning domain.
pub struct ResolvedResource {
    pub server: String,
    pub spec: ResourceSpec,
    pub backend: ResourceBackend,
}

/// Where a resolved prompt lives. Local prompts are static templates;
/// remote ones are fetched over the bridge.
pub enum PromptBackend {
    Local,
    Remote(Arc<BridgeClient>),
}

/// A prompt resolved to its owning domain.
pub struct ResolvedPrompt {
    pub server: String,
    pub spec: PromptSpec,
    pub backend: PromptBackend,
}

/// Overall health of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Reachability of one registered domain.
#[derive(Debug, Clone, Serialize)]
pub struct ServerHealth {
    pub name: String,
    pub reachable: bool,
}

/// Result of [`CapabilityRegistry::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub servers: Vec<ServerHealth>,
}

/// Per-server introspection summary.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    pub name: String,
    pub version: String,
    pub scope_prefix: String,
    pub kind: &'static str,
    pub tool_count: Option<usize>,
    pub restart_count: usize,
}

/// The registry itself. Owned by one host context; never a process-wide
/// singleton, so tests and concurrent hosts stay isolated.
pub struct CapabilityRegistry {
    entries: RwLock<Vec<Entry>>,
    call_deadline: Duration,
}

impl CapabilityRegistry {
    pub fn new(call_deadline: Duration) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            call_deadline,
        }
    }

    /// Register an in-process domain.
    ///
    /// Fails on a scope-prefix collision unless `replace` is set; replacing
    /// a process-backed registration closes the displaced child process.
    pub async fn register_local(&self, domain: LocalDomain, replace: bool) -> CampusResult<()> {
        let prefix = domain.scope_prefix.clone();
        info!(
            server = %domain.name,
            scope_prefix = %prefix,
            tools = domain.tool_count(),
            "Registering in-process domain"
        );
        let displaced = self
            .insert(prefix, DomainServer::Local(domain), replace)
            .await
            .map_err(|(e, _)| e)?;
        self.retire(displaced).await;
        Ok(())
    }

    /// Register a process-backed domain: spawn, handshake, store the live
    /// handle. Spawn or handshake failure fails the registration atomically
    /// and leaves the registry unchanged.
    pub async fn register_process(
        &self,
        config: ProcessServerConfig,
        replace: bool,
    ) -> CampusResult<InitializeResult> {
        let prefix = config.scope_prefix.clone();
        if !replace && self.prefix_taken(&prefix).await {
            return Err(collision_error(&prefix));
        }

        let (client, info) = BridgeClient::connect(&config, self.call_deadline).await?;
        info!(
            server = %config.name,
            scope_prefix = %prefix,
            "Registering process-backed domain"
        );

        let domain = ProcessDomain {
            config,
            client: Arc::new(client),
            info: info.clone(),
            connected_at: Utc::now(),
            restart_count: 0,
        };

        match self.insert(prefix, DomainServer::Process(domain), replace).await {
            Ok(displaced) => {
                self.retire(displaced).await;
                Ok(info)
            }
            Err((e, rejected)) => {
                // Lost a registration race between the pre-check and the
                // insert: don't leak the freshly spawned child.
                if let DomainServer::Process(p) = rejected {
                    let _ = p.client.close().await;
                }
                Err(e)
            }
        }
    }

    /// Resolve a tool to its owning domain. Linear scan in registration
    /// order; process-backed domains require a live list round-trip. A
    /// domain that fails to answer is skipped (its calls would fail anyway).
    pub async fn find_tool(&self, name: &str) -> Option<ResolvedTool> {
        let entries = self.entries.read().await;
        for entry in entries.iter() {
            match &entry.server {
                DomainServer::Local(domain) => {
                    if let Some(tool) = domain.tools.iter().find(|t| t.spec.name == name) {
                        return Some(ResolvedTool {
                            server: domain.name.clone(),
                            spec: tool.spec.clone(),
                            backend: ToolBackend::Local(tool.handler.clone()),
                        });
                    }
                }
                DomainServer::Process(p) => match p.client.list_tools().await {
                    Ok(tools) => {
                        if let Some(def) = tools.into_iter().find(|t| t.name == name) {
                            return Some(ResolvedTool {
                                server: p.config.name.clone(),
                                spec: remote_tool_spec(def),
                                backend: ToolBackend::Remote(p.client.clone()),
                            });
                        }
                    }
                    Err(e) => {
                        warn!(server = %p.config.name, error = %e, "Tool listing failed during lookup");
                    }
                },
            }
        }
        None
    }

    /// Resolve a resource by URI. Same scan discipline as [`find_tool`](Self::find_tool).
    pub async fn find_resource(&self, uri: &str) -> Option<ResolvedResource> {
        let entries = self.entries.read().await;
        for entry in entries.iter() {
            match &entry.server {
                DomainServer::Local(domain) => {
                    if let Some(res) = domain.resources.iter().find(|r| r.spec.uri == uri) {
                        return Some(ResolvedResource {
                            server: domain.name.clone(),
                            spec: res.spec.clone(),
                            backend: ResourceBackend::Local(res.handler.clone()),
                        });
                    }
                }
                DomainServer::Process(p) => match p.client.list_resources().await {
                    Ok(resources) => {
                        if let Some(def) = resources.into_iter().find(|r| r.uri == uri) {
                            return Some(ResolvedResource {
                                server: p.config.name.clone(),
                                spec: remote_resource_spec(def),
                                backend: ResourceBackend::Remote(p.client.clone()),
                            });
                        }
                    }
                    Err(e) => {
                        warn!(server = %p.config.name, error = %e, "Resource listing failed during lookup");
                    }
                },
            }
        }
        None
    }

    /// Resolve a prompt by name.
    pub async fn find_prompt(&self, name: &str) -> Option<ResolvedPrompt> {
        let entries = self.entries.read().await;
        for entry in entries.iter() {
            match &entry.server {
                DomainServer::Local(domain) => {
                    if let Some(spec) = domain.prompts.iter().find(|p| p.name == name) {
                        return Some(ResolvedPrompt {
                            server: domain.name.clone(),
                            spec: spec.clone(),
                            backend: PromptBackend::Local,
                        });
                    }
                }
                DomainServer::Process(p) => match p.client.list_prompts().await {
                    Ok(prompts) => {
                        if let Some(def) = prompts.into_iter().find(|pr| pr.name == name) {
                            return Some(ResolvedPrompt {
                                server: p.config.name.clone(),
                                spec: remote_prompt_spec(def),
                                backend: PromptBackend::Remote(p.client.clone()),
                            });
                        }
                    }
                    Err(e) => {
                        warn!(server = %p.config.name, error = %e, "Prompt listing failed during lookup");
                    }
                },
            }
        }
        None
    }

    /// Authorization-filtered union of tools across every domain — the
    /// capability catalog exposed to the model coordinator.
    pub async fn list_tools(&self, session: &Session) -> Vec<ToolSpec> {
        let entries = self.entries.read().await;
        let mut out = Vec::new();
        for entry in entries.iter() {
            match &entry.server {
                DomainServer::Local(domain) => {
                    out.extend(
                        domain
                            .tools
                            .iter()
                            .map(|t| t.spec.clone())
                            .filter(|s| has_scope(&session.scopes, &s.required_scopes)),
                    );
                }
                DomainServer::Process(p) => match p.client.list_tools().await {
                    Ok(tools) => out.extend(
                        tools
                            .into_iter()
                            .map(remote_tool_spec)
                            .filter(|s| has_scope(&session.scopes, &s.required_scopes)),
                    ),
                    Err(e) => {
                        warn!(server = %p.config.name, error = %e, "Tool listing failed, domain omitted from catalog");
                    }
                },
            }
        }
        out
    }

    /// Authorization-filtered union of resources across every domain.
    pub async fn list_resources(&self, session: &Session) -> Vec<ResourceSpec> {
        let entries = self.entries.read().await;
        let mut out = Vec::new();
        for entry in entries.iter() {
            match &entry.server {
                DomainServer::Local(domain) => {
                    out.extend(
                        domain
                            .resources
                            .iter()
                            .map(|r| r.spec.clone())
                            .filter(|s| has_scope(&session.scopes, &s.required_scopes)),
                    );
                }
                DomainServer::Process(p) => match p.client.list_resources().await {
                    Ok(resources) => out.extend(
                        resources
                            .into_iter()
                            .map(remote_resource_spec)
                            .filter(|s| has_scope(&session.scopes, &s.required_scopes)),
                    ),
                    Err(e) => {
                        warn!(server = %p.config.name, error = %e, "Resource listing failed, domain omitted from catalog");
                    }
                },
            }
        }
        out
    }

    /// Authorization-filtered union of prompts across every domain.
    pub async fn list_prompts(&self, session: &Session) -> Vec<PromptSpec> {
        let entries = self.entries.read().await;
        let mut out = Vec::new();
        for entry in entries.iter() {
            match &entry.server {
                DomainServer::Local(domain) => {
                    out.extend(
                        domain
                            .prompts
                            .iter()
                            .filter(|s| has_scope(&session.scopes, &s.required_scopes))
                            .cloned(),
                    );
                }
                DomainServer::Process(p) => match p.client.list_prompts().await {
                    Ok(prompts) => out.extend(
                        prompts
                            .into_iter()
                            .map(remote_prompt_spec)
                            .filter(|s| has_scope(&session.scopes, &s.required_scopes)),
                    ),
                    Err(e) => {
                        warn!(server = %p.config.name, error = %e, "Prompt listing failed, domain omitted from catalog");
                    }
                },
            }
        }
        out
    }

    /// Ping every process-backed domain. In-process domains are always
    /// reachable. Overall status is `healthy` only if every domain answers.
    pub async fn health_check(&self) -> HealthReport {
        let entries = self.entries.read().await;
        let mut servers = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let (name, reachable) = match &entry.server {
                DomainServer::Local(d) => (d.name.clone(), true),
                DomainServer::Process(p) => {
                    let ok = p.client.ping().await.is_ok();
                    if !ok {
                        warn!(server = %p.config.name, "Health check failed");
                    }
                    (p.config.name.clone(), ok)
                }
            };
            servers.push(ServerHealth { name, reachable });
        }
        let status = if servers.iter().all(|s| s.reachable) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport { status, servers }
    }

    /// Terminate every child process and clear the registry. Individual
    /// close failures are collected and logged, never aborting the rest.
    pub async fn close(&self) -> Vec<CampusError> {
        let mut entries = self.entries.write().await;
        let drained: Vec<Entry> = entries.drain(..).collect();
        drop(entries);

        let mut errors = Vec::new();
        for entry in drained {
            if let DomainServer::Process(p) = entry.server {
                if let Err(e) = p.client.close().await {
                    error!(server = %p.config.name, error = %e, "Failed to close domain server");
                    errors.push(e);
                }
            }
        }
        errors
    }

    /// Per-server introspection, as exposed by the operations surface.
    /// Tool counts for process-backed domains need a live round-trip and
    /// are `None` when the domain is unreachable.
    pub async fn server_summaries(&self) -> Vec<ServerSummary> {
        let entries = self.entries.read().await;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let summary = match &entry.server {
                DomainServer::Local(d) => ServerSummary {
                    name: d.name.clone(),
                    version: d.version.clone(),
                    scope_prefix: entry.prefix.clone(),
                    kind: "local",
                    tool_count: Some(d.tool_count()),
                    restart_count: 0,
                },
                DomainServer::Process(p) => ServerSummary {
                    name: p.config.name.clone(),
                    version: p.info.version.clone(),
                    scope_prefix: entry.prefix.clone(),
                    kind: "process",
                    tool_count: p.client.list_tools().await.ok().map(|t| t.len()),
                    restart_count: p.restart_count,
                },
            };
            out.push(summary);
        }
        out
    }

    pub async fn server_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// One supervision pass: ping every process-backed domain and restart
    /// failed ones with exponential backoff when their registration opts in.
    pub async fn supervise(&self) {
        let failed: Vec<String> = {
            let entries = self.entries.read().await;
            let mut failed = Vec::new();
            for entry in entries.iter() {
                if let DomainServer::Process(p) = &entry.server {
                    if p.client.ping().await.is_err() {
                        failed.push(entry.prefix.clone());
                    }
                }
            }
            failed
        };

        for prefix in failed {
            self.restart(&prefix).await;
        }
    }

    /// Run supervision on an interval until the registry is dropped. The
    /// task holds only a weak handle, so it never keeps the registry alive.
    pub fn start_health_loop(self: Arc<Self>, interval: Duration) {
        let registry = Arc::downgrade(&self);
        drop(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.supervise().await;
            }
        });
    }

    async fn restart(&self, prefix: &str) {
        let config = {
            let entries = self.entries.read().await;
            match entries.iter().find(|e| e.prefix == prefix) {
                Some(Entry {
                    server: DomainServer::Process(p),
                    ..
                }) if p.config.auto_restart => p.config.clone(),
                _ => return,
            }
        };

        info!(server = %config.name, "Attempting domain server restart");
        match reconnect_with_backoff(&config, self.call_deadline, 5).await {
            Ok((client, init)) => {
                let mut entries = self.entries.write().await;
                if let Some(Entry {
                    server: DomainServer::Process(p),
                    ..
                }) = entries.iter_mut().find(|e| e.prefix == prefix)
                {
                    p.client = Arc::new(client);
                    p.info = init;
                    p.connected_at = Utc::now();
                    p.restart_count += 1;
                    info!(
                        server = %config.name,
                        restarts = p.restart_count,
                        "Domain server restarted"
                    );
                }
            }
            Err(e) => {
                error!(server = %config.name, error = %e, "Domain server restart failed after retries");
            }
        }
    }

    async fn prefix_taken(&self, prefix: &str) -> bool {
        self.entries.read().await.iter().any(|e| e.prefix == prefix)
    }

    /// On collision without `replace`, returns the rejected domain back to
    /// the caller so any spawned process can be closed instead of leaked.
    async fn insert(
        &self,
        prefix: String,
        server: DomainServer,
        replace: bool,
    ) -> Result<Option<DomainServer>, (CampusError, DomainServer)> {
        let mut entries = self.entries.write().await;
        match entries.iter().position(|e| e.prefix == prefix) {
            Some(idx) if replace => {
                warn!(
                    scope_prefix = %prefix,
                    old = %entries[idx].server.name(),
                    new = %server.name(),
                    "Replacing existing domain registration"
                );
                let old = std::mem::replace(&mut entries[idx], Entry { prefix, server });
                Ok(Some(old.server))
            }
            Some(_) => Err((collision_error(&prefix), server)),
            None => {
                entries.push(Entry { prefix, server });
                Ok(None)
            }
        }
    }

    async fn retire(&self, displaced: Option<DomainServer>) {
        if let Some(DomainServer::Process(p)) = displaced {
            if let Err(e) = p.client.close().await {
                error!(server = %p.config.name, error = %e, "Failed to close displaced domain server");
            }
        }
    }
}

fn collision_error(prefix: &str) -> CampusError {
    CampusError::Registry(format!(
        "Scope prefix '{prefix}' is already registered; pass replace to override"
    ))
}

fn remote_tool_spec(def: RemoteTool) -> ToolSpec {
    ToolSpec {
        name: def.name,
        description: def.description,
        input_schema: def.input_schema,
        required_scopes: def.required_scopes,
    }
}

fn remote_resource_spec(def: RemoteResource) -> ResourceSpec {
    ResourceSpec {
        uri: def.uri,
        name: def.name,
        description: def.description,
        mime_type: def.mime_type,
        required_scopes: def.required_scopes,
    }
}

fn remote_prompt_spec(def: RemotePrompt) -> PromptSpec {
    PromptSpec {
        name: def.name,
        description: def.description,
        template: def.template,
        variables: def.variables,
        required_scopes: def.required_scopes,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capability::FnTool;
    use campus_auth::{IdentityClaims, Role, SessionManager};

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::new(Duration::from_secs(5))
    }

    fn finance_domain(name: &str) -> LocalDomain {
        LocalDomain::new(name, "1.0.0", "finance").tool(
            "issue_invoice",
            "Generate an invoice for a booking",
            serde_json::json!({"type": "object", "properties": {}}),
            &["finance:write"],
            Arc::new(FnTool(|_: serde_json::Value, _: &Session| {
                Ok(serde_json::json!({"ok": true}))
            })),
        )
    }

    fn session_with(scopes: &[&str]) -> Session {
        let mgr = SessionManager::new();
        mgr.create_session(IdentityClaims {
            user_id: "u-1".into(),
            tenant_id: "t-1".into(),
            role: Role::AdminSales,
            scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
            metadata: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_register_and_find_tool() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        let resolved = reg.find_tool("finance:issue_invoice").await.unwrap();
        assert_eq!(resolved.server, "finance");
        assert_eq!(resolved.spec.required_scopes, vec!["finance:write".to_string()]);
        assert!(reg.find_tool("finance:no_such_tool").await.is_none());
    }

    #[tokio::test]
    async fn test_prefix_collision_fails_without_replace() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        let err = reg
            .register_local(finance_domain("finance-v2"), false)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(reg.server_count().await, 1);
    }

    #[tokio::test]
    async fn test_replace_flag_swaps_registration() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        reg.register_local(finance_domain("finance-v2"), true).await.unwrap();
        assert_eq!(reg.server_count().await, 1);
        let resolved = reg.find_tool("finance:issue_invoice").await.unwrap();
        assert_eq!(resolved.server, "finance-v2");
    }

    #[tokio::test]
    async fn test_list_tools_filtered_by_scope() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();

        let can = session_with(&["finance:*"]);
        assert_eq!(reg.list_tools(&can).await.len(), 1);

        let cannot = session_with(&["academic:read"]);
        assert!(reg.list_tools(&cannot).await.is_empty());
    }

    #[tokio::test]
    async fn test_health_check_local_only_is_healthy() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        let report = reg.health_check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.servers.len(), 1);
        assert!(report.servers[0].reachable);
    }

    #[tokio::test]
    async fn test_close_empties_registry() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        let errors = reg.close().await;
        assert!(errors.is_empty());
        assert_eq!(reg.server_count().await, 0);
    }

    #[tokio::test]
    async fn test_health_loop_does_not_pin_registry() {
        let reg = Arc::new(registry());
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        reg.clone().start_health_loop(Duration::from_secs(3600));
        // Let the immediate first supervision pass finish; afterwards the
        // task sits on its timer holding only the weak handle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&reg), 1);
    }

    #[tokio::test]
    async fn test_server_summaries() {
        let reg = registry();
        reg.register_local(finance_domain("finance"), false).await.unwrap();
        let summaries = reg.server_summaries().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].kind, "local");
        assert_eq!(summaries[0].tool_count, Some(1));
    }
}
