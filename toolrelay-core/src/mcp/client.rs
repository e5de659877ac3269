//! MCP client session over a [`Transport`]

use super::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, McpTool, RequestId, ToolCallParams, ToolCallResult, ToolsListParams,
    ToolsListResult,
};
use super::transport::Transport;
use crate::error::{Result, ToolRelayError};
use serde_json::{Map, Value};

/// Upper bound on `tools/list` pages followed for one listing
const MAX_LIST_PAGES: usize = 64;

/// An initialized client session with one server
pub struct McpClient {
    transport: Box<dyn Transport>,
    next_id: i64,
    initialize: InitializeResult,
}

impl McpClient {
    /// Perform the `initialize` handshake over a fresh transport
    pub async fn connect(transport: Box<dyn Transport>) -> Result<Self> {
        let mut client = Self {
            transport,
            next_id: 1,
            initialize: InitializeResult {
                protocol_version: String::new(),
                capabilities: Value::Null,
                server_info: Default::default(),
            },
        };

        let params = serde_json::to_value(InitializeParams::for_client())?;
        let result = client.request("initialize", Some(params)).await?;
        client.initialize = serde_json::from_value(result)?;

        client
            .notify(JsonRpcNotification::new("notifications/initialized"))
            .await?;

        tracing::info!(
            server = %client.initialize.server_info.name,
            version = %client.initialize.server_info.version,
            protocol = %client.initialize.protocol_version,
            "MCP client initialized"
        );

        Ok(client)
    }

    /// Handshake result reported by the server
    pub fn server(&self) -> &InitializeResult {
        &self.initialize
    }

    /// List every tool, following pagination cursors
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = serde_json::to_value(ToolsListParams {
                cursor: cursor.take(),
            })?;
            let result = self.request("tools/list", Some(params)).await?;
            let page: ToolsListResult = serde_json::from_value(result)?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = tools.len(), "Retrieved tools from MCP server");
        Ok(tools)
    }

    /// Call a tool
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult> {
        tracing::debug!(tool = %name, "Calling MCP tool");

        let params = serde_json::to_value(ToolCallParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn notify(&mut self, notification: JsonRpcNotification) -> Result<()> {
        self.transport
            .send(serde_json::to_value(notification)?)
            .await
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let mut request = JsonRpcRequest::new(id, method);
        if let Some(params) = params {
            request = request.with_params(params);
        }
        self.transport.send(serde_json::to_value(request)?).await?;

        let expected = RequestId::Number(id);
        loop {
            let message = self.transport.receive().await?.ok_or_else(|| {
                ToolRelayError::Transport(format!("server closed connection during '{}'", method))
            })?;

            if message.get("method").is_some() {
                self.handle_server_message(message).await?;
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(message)?;
            if response.id != expected {
                tracing::debug!(id = ?response.id, "Ignoring response for another request");
                continue;
            }

            return response.into_result();
        }
    }

    /// Server-initiated traffic: notifications are ignored, requests are
    /// answered with method-not-found.
    async fn handle_server_message(&mut self, message: Value) -> Result<()> {
        let Some(id) = message.get("id").cloned() else {
            return Ok(());
        };

        let id: RequestId = serde_json::from_value(id)?;
        let response = JsonRpcResponse::error(id, JsonRpcError::method_not_found());
        self.transport.send(serde_json::to_value(response)?).await
    }
}
