//! External server adapter backed by MCP child processes

use super::client::McpClient;
use super::transport::{ChildProcessTransport, Transport};
use crate::discovery::{ExternalServerAdapter, RawToolInfo, ServerDiscovery};
use crate::error::{Result, ToolRelayError};
use crate::tools::ServerInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Configuration for one MCP tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server name; becomes the `source` of its tools
    pub name: String,

    /// Executable to spawn
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Transport label reported in `ServerInfo::server_type`
    #[serde(default = "default_server_type")]
    pub server_type: String,

    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Bound on each protocol round trip with this server
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_server_type() -> String {
    "stdio".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl McpServerConfig {
    /// Create a config for a stdio server
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            server_type: default_server_type(),
            requires_auth: false,
            category: None,
            request_timeout: default_request_timeout(),
        }
    }

    /// Add a command-line argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set auth requirement
    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Set category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Opens transports to configured servers
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, config: &McpServerConfig) -> Result<Box<dyn Transport>>;
}

/// Connector that spawns each server as a child process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessConnector;

#[async_trait]
impl TransportConnector for ProcessConnector {
    async fn connect(&self, config: &McpServerConfig) -> Result<Box<dyn Transport>> {
        let transport = ChildProcessTransport::spawn(&config.command, &config.args, &config.env)?;
        Ok(Box::new(transport))
    }
}

type Slot = Mutex<Option<Arc<Mutex<McpClient>>>>;

/// [`ExternalServerAdapter`] speaking MCP to configured servers
///
/// Connections are opened on first use and reused. A transport failure
/// drops the connection so the next call reconnects.
pub struct McpServerAdapter {
    servers: Vec<McpServerConfig>,
    connector: Arc<dyn TransportConnector>,
    slots: HashMap<String, Slot>,
}

impl McpServerAdapter {
    /// Create an adapter that spawns servers as child processes
    pub fn new(servers: Vec<McpServerConfig>) -> Self {
        Self::with_connector(servers, Arc::new(ProcessConnector))
    }

    /// Create an adapter with a custom connector
    pub fn with_connector(
        servers: Vec<McpServerConfig>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        let slots = servers
            .iter()
            .map(|s| (s.name.clone(), Mutex::new(None)))
            .collect();
        Self {
            servers,
            connector,
            slots,
        }
    }

    /// Number of currently open connections
    pub async fn open_connections(&self) -> usize {
        let mut open = 0;
        for slot in self.slots.values() {
            if slot.lock().await.is_some() {
                open += 1;
            }
        }
        open
    }

    /// Drop all open connections
    pub async fn disconnect_all(&self) {
        for slot in self.slots.values() {
            slot.lock().await.take();
        }
    }

    fn config(&self, server: &str) -> Result<&McpServerConfig> {
        self.servers
            .iter()
            .find(|s| s.name == server)
            .ok_or_else(|| ToolRelayError::discovery(server, "server is not configured"))
    }

    async fn client(&self, config: &McpServerConfig) -> Result<Arc<Mutex<McpClient>>> {
        let slot = self
            .slots
            .get(&config.name)
            .ok_or_else(|| ToolRelayError::discovery(&config.name, "server is not configured"))?;

        let mut guard = slot.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let connect = async {
            let transport = self.connector.connect(config).await?;
            McpClient::connect(transport).await
        };
        let client = tokio::time::timeout(config.request_timeout, connect)
            .await
            .map_err(|_| {
                ToolRelayError::Transport(format!(
                    "connecting to '{}' timed out after {:?}",
                    config.name, config.request_timeout
                ))
            })??;

        let client = Arc::new(Mutex::new(client));
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn reset_on_transport_error<T>(&self, server: &str, result: &Result<T>) {
        if matches!(result, Err(ToolRelayError::Transport(_))) {
            if let Some(slot) = self.slots.get(server) {
                slot.lock().await.take();
                tracing::warn!(server = %server, "Dropped MCP connection after transport error");
            }
        }
    }
}

#[async_trait]
impl ExternalServerAdapter for McpServerAdapter {
    fn server_names(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.name.clone()).collect()
    }

    async fn discover(&self, server: &str) -> Result<ServerDiscovery> {
        let config = self.config(server)?;

        let result: Result<ServerDiscovery> = async {
            let client = self.client(config).await?;
            let mut client = client.lock().await;

            let tools = tokio::time::timeout(config.request_timeout, client.list_tools())
                .await
                .map_err(|_| {
                    ToolRelayError::Transport(format!(
                        "tools/list on '{}' timed out after {:?}",
                        config.name, config.request_timeout
                    ))
                })??;

            let version = match client.server().server_info.version.as_str() {
                "" => "unknown".to_string(),
                v => v.to_string(),
            };

            Ok(ServerDiscovery {
                tools: tools
                    .into_iter()
                    .map(|t| RawToolInfo {
                        name: t.name,
                        description: t.description,
                        input_schema: t.input_schema,
                    })
                    .collect(),
                server_info: ServerInfo::new(&config.name, &config.server_type, version),
            })
        }
        .await;

        self.reset_on_transport_error(server, &result).await;
        result
    }

    async fn invoke(
        &self,
        server: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value> {
        let config = self.config(server)?;

        let result: Result<Value> = async {
            let client = self.client(config).await?;
            let mut client = client.lock().await;

            let call = tokio::time::timeout(config.request_timeout, client.call_tool(tool, arguments))
                .await
                .map_err(|_| ToolRelayError::Timeout {
                    tool: tool.to_string(),
                    timeout: config.request_timeout,
                })??;

            if call.is_error.unwrap_or(false) {
                return Err(ToolRelayError::execution(tool, call.text()));
            }
            Ok(call.into_value())
        }
        .await;

        self.reset_on_transport_error(server, &result).await;
        result
    }

    fn requires_auth(&self, server: &str) -> bool {
        self.config(server).map(|c| c.requires_auth).unwrap_or(false)
    }

    fn category(&self, server: &str) -> Option<String> {
        self.config(server).ok().and_then(|c| c.category.clone())
    }
}
