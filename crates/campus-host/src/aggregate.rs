//! Context aggregation — concurrent fan-out over heterogeneous requests,
//! merged into one ephemeral bundle for a model turn.
//!
//! Every request settles before the bundle is returned; individual
//! failures are logged and omitted, never fatal to the aggregate.

use crate::router::Router;
use campus_auth::Session;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Placeholder until relevance scoring lands; token-budget trimming hangs
/// off the same extension point.
const DEFAULT_RELEVANCE: f32 = 1.0;

/// Kind discriminator for bundle items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Tool,
    Resource,
    Prompt,
}

/// One request inside an aggregation batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContextRequest {
    Tool {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    Resource {
        uri: String,
        #[serde(default)]
        params: HashMap<String, String>,
    },
    Prompt {
        name: String,
    },
}

impl ContextRequest {
    fn kind(&self) -> ContextKind {
        match self {
            ContextRequest::Tool { .. } => ContextKind::Tool,
            ContextRequest::Resource { .. } => ContextKind::Resource,
            ContextRequest::Prompt { .. } => ContextKind::Prompt,
        }
    }

    fn target(&self) -> &str {
        match self {
            ContextRequest::Tool { name, .. } => name,
            ContextRequest::Resource { uri, .. } => uri,
            ContextRequest::Prompt { name } => name,
        }
    }
}

/// One successful result inside a bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ContextItem {
    /// Name of the domain server that produced the content.
    pub source: String,
    pub kind: ContextKind,
    pub content: serde_json::Value,
    pub relevance: f32,
    pub timestamp: DateTime<Utc>,
}

/// Ephemeral aggregation result; produced fresh per call, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub session_id: Uuid,
    pub items: Vec<ContextItem>,
    pub truncated: bool,
}

/// Executes aggregation batches through the router's authorization path.
pub struct ContextAggregator {
    router: Arc<Router>,
}

impl ContextAggregator {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    /// Execute every request concurrently and merge the successes.
    ///
    /// Failed requests are logged and omitted; an all-failure batch yields
    /// an empty bundle rather than an error.
    pub async fn aggregate_context(
        &self,
        session: &Session,
        requests: Vec<ContextRequest>,
    ) -> ContextBundle {
        let settled = join_all(requests.into_iter().map(|req| {
            let router = self.router.clone();
            async move {
                let kind = req.kind();
                let target = req.target().to_string();
                let response = match req {
                    ContextRequest::Tool { name, input } => {
                        router.execute_tool(&name, input, session).await
                    }
                    ContextRequest::Resource { uri, params } => {
                        router.fetch_resource(&uri, session, &params).await
                    }
                    ContextRequest::Prompt { name } => router.get_prompt(&name, session).await,
                };
                (kind, target, response)
            }
        }))
        .await;

        let mut items = Vec::with_capacity(settled.len());
        for (kind, target, response) in settled {
            if response.success {
                let source = response
                    .metadata
                    .as_ref()
                    .map(|m| m.server.clone())
                    .unwrap_or_default();
                items.push(ContextItem {
                    source,
                    kind,
                    content: response.data.unwrap_or(serde_json::Value::Null),
                    relevance: DEFAULT_RELEVANCE,
                    timestamp: Utc::now(),
                });
            } else {
                let reason = response
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "unknown".to_string());
                warn!(kind = ?kind, target = %target, reason = %reason, "Context request dropped from bundle");
            }
        }

        ContextBundle {
            session_id: session.id,
            items,
            truncated: false,
        }
    }
}
