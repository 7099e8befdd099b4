//! Stdio MCP client that owns the tool server child process.

use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proto::{ConnectionError, ToolDescriptor, ToolOutput};
use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, Tool as McpTool};
use rmcp::service::{Peer, RoleClient, RunningService, ServiceError};
use rmcp::transport::TokioChildProcess;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::ToolBridge;
use crate::normalize::normalize_call_result;

/// Environment variables forwarded to the analytics tool server.
pub const ANALYTICS_ENV_KEYS: [&str; 10] = [
    "SERVER",
    "SITE_NAME",
    "AUTH",
    "JWT_SUB_CLAIM",
    "CONNECTED_APP_CLIENT_ID",
    "CONNECTED_APP_CLIENT_SECRET",
    "CONNECTED_APP_SECRET_VALUE",
    "PAT_NAME",
    "PAT_VALUE",
    "DEFAULT_LOG_LEVEL",
];

/// Inherited from the parent; everything else is cleared.
const INHERITED_ENV_KEYS: [&str; 5] = ["PATH", "HOME", "USER", "LANG", "TERM"];

/// How to launch the tool server.
#[derive(Debug, Clone)]
pub struct McpBridgeConfig {
    /// Server script; `.py` and `.js` are supported.
    pub script_path: Option<PathBuf>,
    pub python_command: String,
    pub node_command: String,
    /// Extra environment, already filtered to the variables that are set.
    pub env: Vec<(String, String)>,
    /// Bound on the `initialize` handshake plus `tools/list`.
    pub handshake_timeout: Duration,
}

impl Default for McpBridgeConfig {
    fn default() -> Self {
        Self {
            script_path: None,
            python_command: "python".to_string(),
            node_command: "node".to_string(),
            env: Vec::new(),
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

impl McpBridgeConfig {
    /// Picks the interpreter for the configured script.
    pub fn launcher(&self) -> Result<(&str, &Path), ConnectionError> {
        let script = self
            .script_path
            .as_deref()
            .ok_or(ConnectionError::NotConfigured)?;
        let ext = script
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("py") => Ok((self.python_command.as_str(), script)),
            Some("js") => Ok((self.node_command.as_str(), script)),
            _ => Err(ConnectionError::UnsupportedScript(
                script.display().to_string(),
            )),
        }
    }
}

struct Connection {
    service: RunningService<RoleClient, ()>,
    peer: Peer<RoleClient>,
    generation: u64,
}

/// Process-wide MCP client. Connection state is explicit: `connect`,
/// `ensure_connected` and `cleanup` are the only transitions besides a
/// transport failure during `call_tool`.
///
/// Connects are serialized, so concurrent reconnects spawn one tool server.
pub struct McpBridge {
    config: McpBridgeConfig,
    connected: AtomicBool,
    generation: AtomicU64,
    connect_lock: Mutex<()>,
    conn: RwLock<Option<Connection>>,
    tools: RwLock<Vec<ToolDescriptor>>,
}

impl McpBridge {
    pub fn new(config: McpBridgeConfig) -> Self {
        Self {
            config,
            connected: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            connect_lock: Mutex::new(()),
            conn: RwLock::new(None),
            tools: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &McpBridgeConfig {
        &self.config
    }

    /// Spawns the tool server and performs the handshake.
    ///
    /// Any previous connection is torn down first. On failure the bridge
    /// stays disconnected.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let _guard = self.connect_lock.lock().await;
        self.spawn().await
    }

    /// Connects over already-open streams instead of spawning a process.
    pub async fn attach<R, W>(&self, reader: R, writer: W) -> Result<(), ConnectionError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let _guard = self.connect_lock.lock().await;
        self.establish(().serve((reader, writer))).await
    }

    /// Reconnects when the bridge is down. A no-op when already connected.
    ///
    /// Callers racing on a dropped bridge wait for the first reconnect
    /// instead of spawning their own.
    pub async fn ensure_connected(&self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            return Ok(());
        }
        let _guard = self.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        info!("Tool bridge disconnected, reconnecting");
        self.spawn().await
    }

    /// Shuts the session down and kills the child process. Safe to call when
    /// never connected.
    pub async fn cleanup(&self) {
        let _guard = self.connect_lock.lock().await;
        self.teardown().await;
    }

    async fn spawn(&self) -> Result<(), ConnectionError> {
        let (program, script) = self.config.launcher()?;

        let mut cmd = Command::new(program);
        cmd.arg(script).kill_on_drop(true);

        cmd.env_clear();
        for key in INHERITED_ENV_KEYS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        for (k, v) in &self.config.env {
            cmd.env(k, v);
        }

        let (transport, stderr) = TokioChildProcess::builder(cmd)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ConnectionError::Spawn(format!(
                    "failed to spawn '{program} {}': {e}",
                    script.display()
                ))
            })?;
        if let Some(stderr) = stderr {
            tokio::spawn(forward_stderr(stderr));
        }

        info!(program, script = %script.display(), "Tool server spawned");
        self.establish(().serve(transport)).await
    }

    /// Runs the handshake and the tool listing under one timeout, then
    /// publishes the new session. Must be called with `connect_lock` held.
    async fn establish<F, E>(&self, serve: F) -> Result<(), ConnectionError>
    where
        F: Future<Output = Result<RunningService<RoleClient, ()>, E>>,
        E: Display,
    {
        self.teardown().await;

        let handshake = async {
            let service = serve
                .await
                .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
            if let Some(info) = service.peer_info() {
                debug!(server = %info.server_info.name, "Tool server initialized");
            }
            let listed = service
                .list_all_tools()
                .await
                .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
            Ok::<_, ConnectionError>((service, listed))
        };
        let (service, listed) =
            match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ConnectionError::Handshake(format!(
                        "no response within {:?}",
                        self.config.handshake_timeout
                    )));
                }
            };

        let tools: Vec<ToolDescriptor> = listed.into_iter().map(descriptor).collect();
        info!(
            tools = tools.len(),
            names = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Tool bridge connected"
        );
        *self.tools.write().await = tools;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let peer = service.peer().clone();
        let mut conn = self.conn.write().await;
        *conn = Some(Connection {
            service,
            peer,
            generation,
        });
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn teardown(&self) {
        self.connected.store(false, Ordering::Release);
        self.tools.write().await.clear();
        let Some(conn) = self.conn.write().await.take() else {
            return;
        };
        if let Err(e) = conn.service.cancel().await {
            debug!(error = %e, "Tool session task ended abnormally");
        }
        info!(generation = conn.generation, "Tool bridge closed");
    }

    async fn session(&self) -> Result<(Peer<RoleClient>, u64), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        self.conn
            .read()
            .await
            .as_ref()
            .map(|c| (c.peer.clone(), c.generation))
            .ok_or(ConnectionError::NotConnected)
    }

    /// Marks the bridge down unless a newer session already replaced the
    /// one that failed.
    async fn mark_failed(&self, generation: u64) {
        let conn = self.conn.read().await;
        if conn.as_ref().is_some_and(|c| c.generation == generation) {
            self.connected.store(false, Ordering::Release);
        }
    }
}

fn descriptor(tool: McpTool) -> ToolDescriptor {
    ToolDescriptor::new(
        tool.name.to_string(),
        tool.description.as_deref().unwrap_or_default(),
        Value::Object((*tool.input_schema).clone()),
    )
}

#[async_trait]
impl ToolBridge for McpBridge {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        Ok(self.tools.read().await.clone())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolOutput, ConnectionError> {
        let (peer, generation) = self.session().await?;
        let params = CallToolRequestParams {
            meta: None,
            name: Cow::Owned(name.to_string()),
            arguments: args.as_object().cloned(),
            task: None,
        };
        match peer.call_tool(params).await {
            Ok(result) => Ok(normalize_call_result(&result)),
            Err(ServiceError::McpError(e)) => Err(ConnectionError::Protocol {
                code: i64::from(e.code.0),
                message: e.message.to_string(),
            }),
            Err(e) => {
                warn!(tool = name, error = %e, "Tool transport failed, marking bridge disconnected");
                self.mark_failed(generation).await;
                Err(ConnectionError::CallFailed {
                    tool: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

async fn forward_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "lumen::tool_server", "{line}");
    }
}
