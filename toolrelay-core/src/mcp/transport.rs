//! MCP Transport Implementations
//!
//! Transports move raw JSON-RPC messages between the client and a tool
//! server. Messages are newline-delimited JSON.

use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::error::{Result, ToolRelayError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send {
    /// Send one message to the server
    async fn send(&mut self, message: Value) -> Result<()>;

    /// Receive the next message from the server (`None` on EOF)
    async fn receive(&mut self) -> Result<Option<Value>>;
}

/// Stdio transport to a spawned child process
pub struct ChildProcessTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ChildProcessTransport {
    /// Spawn a server process with piped stdin/stdout
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        tracing::debug!(command = %command, args = ?args, "Spawning MCP server process");

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolRelayError::Transport(format!("failed to spawn '{}': {}", command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolRelayError::Transport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolRelayError::Transport("child stdout unavailable".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// OS process id of the server, if still running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl Transport for ChildProcessTransport {
    async fn send(&mut self, message: Value) -> Result<()> {
        let json = serde_json::to_string(&message)?;

        self.stdin
            .write_all(format!("{}\n", json).as_bytes())
            .await
            .map_err(|e| ToolRelayError::Transport(format!("failed to write to server: {}", e)))?;

        self.stdin
            .flush()
            .await
            .map_err(|e| ToolRelayError::Transport(format!("failed to flush server stdin: {}", e)))?;

        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Value>> {
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line).await.map_err(|e| {
                ToolRelayError::Transport(format!("failed to read from server: {}", e))
            })?;

            if read == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str(trimmed) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    // Servers sometimes log to stdout; skip non-JSON lines
                    tracing::debug!(error = %e, line = %trimmed, "Skipping non-JSON line from server");
                }
            }
        }
    }
}

type Responder = Box<dyn Fn(&JsonRpcRequest) -> Option<JsonRpcResponse> + Send + Sync>;

/// In-memory transport for testing
///
/// Requests are answered synchronously by a responder function; responses
/// are queued until received.
pub struct MemoryTransport {
    responder: Responder,
    pending: VecDeque<Value>,
    sent: Vec<Value>,
}

impl MemoryTransport {
    /// Create a transport that answers requests with `responder`
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&JsonRpcRequest) -> Option<JsonRpcResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            pending: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queue an unsolicited server message
    pub fn push_incoming(&mut self, message: Value) {
        self.pending.push_back(message);
    }

    /// All messages sent by the client
    pub fn sent(&self) -> &[Value] {
        &self.sent
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, message: Value) -> Result<()> {
        self.sent.push(message.clone());

        if message.get("id").is_some() && message.get("method").is_some() {
            let request: JsonRpcRequest = serde_json::from_value(message)?;
            let response = (self.responder)(&request).unwrap_or_else(|| {
                JsonRpcResponse::error(request.id.clone(), JsonRpcError::method_not_found())
            });
            self.pending.push_back(serde_json::to_value(response)?);
        }

        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Value>> {
        Ok(self.pending.pop_front())
    }
}
