//! The campus capability host — orchestration layer for the
//! school-operations platform.
//!
//! The host authenticates callers into scoped sessions, keeps a registry
//! of domain servers (in-process descriptor tables or spawned child
//! processes), routes requests through a wildcard scope check, and
//! assembles context bundles for model turns.
//!
//! All state lives in one [`CapabilityHost`] value owned by the embedding
//! process; there are no process-wide singletons, so multiple hosts can
//! coexist (and tests stay isolated).

pub mod aggregate;
pub mod bridge;
pub mod capability;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod validate;

pub use aggregate::{ContextAggregator, ContextBundle, ContextItem, ContextRequest};
pub use bridge::{BridgeClient, ProcessServerConfig};
pub use capability::{
    FnResource, FnTool, LocalDomain, PromptSpec, ResourceHandler, ResourceSpec, ToolHandler,
    ToolSpec,
};
pub use registry::{CapabilityRegistry, HealthReport, HealthStatus, ServerSummary};
pub use router::Router;

use campus_auth::SessionManager;
use campus_core::CampusResult;
use protocol::InitializeResult;
use std::sync::Arc;
use std::time::Duration;

/// Host-level configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub name: String,
    pub version: String,
    /// Per-call deadline threaded through the router and process bridge.
    pub call_timeout: Duration,
    /// Interval of the supervision loop; `None` disables supervision.
    pub health_check_interval: Option<Duration>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: "campus-host".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            call_timeout: Duration::from_secs(30),
            health_check_interval: Some(Duration::from_secs(60)),
        }
    }
}

/// One long-lived host instance: session manager, capability registry,
/// router, and aggregator, wired together.
pub struct CapabilityHost {
    config: HostConfig,
    sessions: SessionManager,
    registry: Arc<CapabilityRegistry>,
    router: Arc<Router>,
    aggregator: ContextAggregator,
}

impl CapabilityHost {
    pub fn new(config: HostConfig) -> Self {
        let registry = Arc::new(CapabilityRegistry::new(config.call_timeout));
        let router = Arc::new(Router::new(registry.clone(), config.call_timeout));
        let aggregator = ContextAggregator::new(router.clone());
        Self {
            config,
            sessions: SessionManager::new(),
            registry,
            router,
            aggregator,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn aggregator(&self) -> &ContextAggregator {
        &self.aggregator
    }

    /// Register an in-process domain server.
    pub async fn register_server(&self, domain: LocalDomain, replace: bool) -> CampusResult<()> {
        self.registry.register_local(domain, replace).await
    }

    /// Register a process-backed domain server: spawn, handshake, store.
    pub async fn register_process_server(
        &self,
        config: ProcessServerConfig,
        replace: bool,
    ) -> CampusResult<InitializeResult> {
        self.registry.register_process(config, replace).await
    }

    /// Start the supervision loop if the configuration enables it.
    pub fn start_supervision(&self) {
        if let Some(interval) = self.config.health_check_interval {
            self.registry.clone().start_health_loop(interval);
        }
    }

    /// Ping every registered domain.
    pub async fn health_check(&self) -> HealthReport {
        self.registry.health_check().await
    }

    /// Shut down: terminate child processes, clear the registry.
    pub async fn close(&self) -> Vec<campus_core::CampusError> {
        self.registry.close().await
    }
}

impl Default for CapabilityHost {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
