//! Error types for toolrelay operations

use std::time::Duration;

/// Result type for toolrelay operations
pub type Result<T> = std::result::Result<T, ToolRelayError>;

/// Error types for the tool discovery and execution subsystem
#[derive(Debug, thiserror::Error)]
pub enum ToolRelayError {
    /// A single discovery source failed
    #[error("Discovery failed for source '{source_name}': {message}")]
    Discovery {
        source_name: String,
        message: String,
    },

    /// Requested tool is not in the catalog
    #[error("unknown tool: '{0}'")]
    UnknownTool(String),

    /// Pre-flight validation found tools missing from the catalog
    #[error("unknown tools: {}", .0.join(", "))]
    UnknownTools(Vec<String>),

    /// The external call itself failed
    #[error("Tool '{tool}' execution failed: {message}")]
    Execution { tool: String, message: String },

    /// The external call did not finish in time
    #[error("Tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    /// The surrounding operation was cancelled
    #[error("Tool '{0}' execution cancelled")]
    Cancelled(String),

    /// The durable queue rejected a unit of work
    #[error("Enqueue error: {0}")]
    Enqueue(String),

    /// Cache store error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Transport-level failure talking to a tool server
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed protocol message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Misuse of the API (not a runtime failure)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ToolRelayError {
    /// Helper for per-source discovery errors
    pub fn discovery(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        ToolRelayError::Discovery {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Helper for execution errors
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolRelayError::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<String> for ToolRelayError {
    fn from(s: String) -> Self {
        ToolRelayError::Other(s)
    }
}

impl From<&str> for ToolRelayError {
    fn from(s: &str) -> Self {
        ToolRelayError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolRelayError {
    fn from(err: anyhow::Error) -> Self {
        ToolRelayError::Other(err.to_string())
    }
}
