//! Process bridge — spawns a domain server as a child process and speaks
//! the line-delimited RPC protocol over its stdio.
//!
//! The transport owns call/response correlation: each request gets a fresh
//! id and a oneshot slot in the pending map; a background reader task
//! resolves slots as response lines arrive. Concurrent host requests may
//! therefore interleave on one channel.

use crate::protocol::*;
use campus_core::{CampusError, CampusResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

/// Registration of a process-backed domain server.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessServerConfig {
    /// Display name of the domain server.
    pub name: String,
    /// Scope prefix this server owns (e.g. `finance`).
    pub scope_prefix: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Restart with backoff when a health check fails (default: true).
    #[serde(default = "default_true")]
    pub auto_restart: bool,
}

fn default_true() -> bool {
    true
}

/// RPC client for one child-process domain server.
pub struct BridgeClient {
    stdin: Mutex<tokio::process::ChildStdin>,
    child: Mutex<Child>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>,
    next_id: AtomicU64,
    server_name: String,
    default_deadline: Duration,
}

impl BridgeClient {
    /// Spawn the configured command and perform the `initialize` handshake.
    ///
    /// Failure at any step (spawn, pipe setup, handshake) fails the whole
    /// connection; a half-started server is never returned.
    pub async fn connect(
        config: &ProcessServerConfig,
        default_deadline: Duration,
    ) -> CampusResult<(Self, InitializeResult)> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        for (key, val) in &config.env {
            cmd.env(key, val);
        }

        let mut child = cmd.spawn().map_err(|e| {
            CampusError::Bridge(format!(
                "Failed to spawn domain server '{}': {}",
                config.command, e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CampusError::Bridge("Domain server stdin not available".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CampusError::Bridge("Domain server stdout not available".into()))?;

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        // Reader task: resolves pending requests as response lines arrive.
        let pending_reader = pending.clone();
        let name_for_reader = config.name.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(server = %name_for_reader, "Domain server stdout closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<RpcResponse>(trimmed) {
                            Ok(resp) => {
                                if let Some(id) = resp.id {
                                    let mut map = pending_reader.lock().await;
                                    if let Some(tx) = map.remove(&id) {
                                        let _ = tx.send(resp);
                                    }
                                }
                            }
                            Err(e) => {
                                debug!(
                                    server = %name_for_reader,
                                    line = %trimmed,
                                    error = %e,
                                    "Non-protocol line from domain server"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        error!(server = %name_for_reader, error = %e, "Error reading domain server stdout");
                        break;
                    }
                }
            }
        });

        let client = Self {
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            pending,
            next_id: AtomicU64::new(1),
            server_name: config.name.clone(),
            default_deadline,
        };

        let init = match client.initialize().await {
            Ok(init) => init,
            Err(e) => {
                // A spawned child whose handshake failed must not outlive
                // the registration attempt.
                if let Err(kill_err) = client.close().await {
                    warn!(server = %client.server_name, error = %kill_err, "Failed to kill child after handshake failure");
                }
                return Err(e);
            }
        };
        info!(
            server = %client.server_name,
            remote_name = %init.name,
            remote_version = %init.version,
            "Domain server initialized"
        );

        Ok((client, init))
    }

    /// Send a request and wait for its correlated response, bounded by the
    /// given deadline (or the client default).
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        meta: Option<CallMeta>,
        deadline: Option<Duration>,
    ) -> CampusResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = RpcRequest::new(id, method, params, meta);

        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(id, tx);
        }

        let msg = serde_json::to_string(&req)?;

        {
            let mut stdin = self.stdin.lock().await;
            let write = async {
                stdin.write_all(msg.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            };
            if let Err(e) = write.await {
                self.pending.lock().await.remove(&id);
                return Err(CampusError::Bridge(format!(
                    "Failed to write to '{}' stdin: {}",
                    self.server_name, e
                )));
            }
        }

        let deadline = deadline.unwrap_or(self.default_deadline);
        let resp = match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                return Err(CampusError::Bridge(format!(
                    "Response channel for '{}' dropped",
                    self.server_name
                )))
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(CampusError::Bridge(format!(
                    "Request '{}' to '{}' exceeded deadline of {}ms",
                    method,
                    self.server_name,
                    deadline.as_millis()
                )));
            }
        };

        if let Some(err) = resp.error {
            // Remote handler failures keep their original message so the
            // router can surface it verbatim.
            return Err(CampusError::Handler(err.message));
        }

        Ok(resp.result.unwrap_or(serde_json::Value::Null))
    }

    async fn initialize(&self) -> CampusResult<InitializeResult> {
        let params = serde_json::json!({
            "protocol_version": "1",
            "host": {
                "name": "campus-host",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result = self
            .request(method::INITIALIZE, Some(params), None, None)
            .await?;
        serde_json::from_value(result)
            .map_err(|e| CampusError::Bridge(format!("Failed to parse initialize result: {e}")))
    }

    /// List tools declared by the remote domain.
    pub async fn list_tools(&self) -> CampusResult<Vec<RemoteTool>> {
        let result = self.request(method::LIST_TOOLS, None, None, None).await?;
        parse_listing(result, "tools")
    }

    /// List resources declared by the remote domain.
    pub async fn list_resources(&self) -> CampusResult<Vec<RemoteResource>> {
        let result = self
            .request(method::LIST_RESOURCES, None, None, None)
            .await?;
        parse_listing(result, "resources")
    }

    /// List prompts declared by the remote domain.
    pub async fn list_prompts(&self) -> CampusResult<Vec<RemotePrompt>> {
        let result = self.request(method::LIST_PROMPTS, None, None, None).await?;
        parse_listing(result, "prompts")
    }

    /// Execute a remote tool, carrying the caller's identity as metadata.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        meta: CallMeta,
        deadline: Option<Duration>,
    ) -> CampusResult<serde_json::Value> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        self.request(method::CALL_TOOL, Some(params), Some(meta), deadline)
            .await
    }

    /// Read a remote resource.
    pub async fn read_resource(
        &self,
        uri: &str,
        params: &HashMap<String, String>,
        meta: CallMeta,
        deadline: Option<Duration>,
    ) -> CampusResult<serde_json::Value> {
        let params = serde_json::to_value(ReadResourceParams {
            uri: uri.to_string(),
            params: params.clone(),
        })?;
        self.request(method::READ_RESOURCE, Some(params), Some(meta), deadline)
            .await
    }

    /// Fetch a remote prompt template.
    pub async fn get_prompt(
        &self,
        name: &str,
        meta: CallMeta,
        deadline: Option<Duration>,
    ) -> CampusResult<serde_json::Value> {
        let params = serde_json::json!({ "name": name });
        self.request(method::GET_PROMPT, Some(params), Some(meta), deadline)
            .await
    }

    /// Liveness probe.
    pub async fn ping(&self) -> CampusResult<()> {
        self.request(method::PING, None, None, None).await?;
        Ok(())
    }

    /// Terminate the child process.
    pub async fn close(&self) -> CampusResult<()> {
        let mut child = self.child.lock().await;
        child.kill().await.map_err(|e| {
            CampusError::Bridge(format!("Failed to kill '{}': {}", self.server_name, e))
        })?;
        info!(server = %self.server_name, "Domain server process terminated");
        Ok(())
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

fn parse_listing<T: serde::de::DeserializeOwned>(
    result: serde_json::Value,
    key: &str,
) -> CampusResult<Vec<T>> {
    serde_json::from_value(
        result
            .get(key)
            .cloned()
            .unwrap_or(serde_json::json!([])),
    )
    .map_err(|e| CampusError::Bridge(format!("Failed to parse {key} listing: {e}")))
}

/// Reconnect to a crashed domain server with exponential backoff.
pub(crate) async fn reconnect_with_backoff(
    config: &ProcessServerConfig,
    default_deadline: Duration,
    max_retries: u32,
) -> CampusResult<(BridgeClient, InitializeResult)> {
    let mut delay = Duration::from_secs(1);

    for attempt in 1..=max_retries {
        match BridgeClient::connect(config, default_deadline).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!(
                    server = %config.name,
                    attempt = attempt,
                    max_retries = max_retries,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Domain server reconnect failed, retrying"
                );
                if attempt < max_retries {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(60));
                }
            }
        }
    }

    Err(CampusError::Bridge(format!(
        "Failed to reconnect to domain server '{}' after {} retries",
        config.name, max_retries
    )))
}
