//! External tool server adapter

use crate::error::Result;
use crate::tools::{ServerInfo, ToolDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool as reported by a server, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToolInfo {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub input_schema: Value,
}

impl RawToolInfo {
    /// Create a raw tool record
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }

    /// Normalize into a catalog descriptor
    pub fn into_descriptor(
        self,
        server: ServerInfo,
        requires_auth: bool,
        category: Option<String>,
    ) -> ToolDescriptor {
        ToolDescriptor::external(
            self.name,
            self.description.unwrap_or_default(),
            self.input_schema,
            server,
        )
        .with_requires_auth(requires_auth)
        .with_category(category)
    }
}

/// Result of querying one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDiscovery {
    pub tools: Vec<RawToolInfo>,
    pub server_info: ServerInfo,
}

impl ServerDiscovery {
    /// Normalize every tool of this server
    pub fn into_descriptors(
        self,
        requires_auth: bool,
        category: Option<String>,
    ) -> Vec<ToolDescriptor> {
        let server_info = self.server_info;
        self.tools
            .into_iter()
            .map(|raw| raw.into_descriptor(server_info.clone(), requires_auth, category.clone()))
            .collect()
    }
}

/// Queries configured tool servers and invokes their tools
#[async_trait]
pub trait ExternalServerAdapter: Send + Sync {
    /// Configured server names, in merge order
    fn server_names(&self) -> Vec<String>;

    /// List the tools one server currently exposes
    async fn discover(&self, server: &str) -> Result<ServerDiscovery>;

    /// Invoke a tool on a server and return its functional result
    async fn invoke(&self, server: &str, tool: &str, arguments: Map<String, Value>)
        -> Result<Value>;

    /// Whether tools from this server need credentials
    fn requires_auth(&self, _server: &str) -> bool {
        false
    }

    /// Category applied to every tool from this server
    fn category(&self, _server: &str) -> Option<String> {
        None
    }
}
