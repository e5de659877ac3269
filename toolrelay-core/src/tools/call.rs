//! Tool call requests, execution context and results

use super::descriptor::ExecutionMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A single requested tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name to resolve in the catalog
    pub name: String,

    /// Call arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Correlation id (caller-supplied or generated)
    pub call_id: String,
}

impl ToolCallRequest {
    /// Create a request with a generated call id
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            call_id: generate_call_id(),
        }
    }

    /// Create a request from a JSON value
    ///
    /// Non-object values are treated as an empty argument map.
    pub fn from_value(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, arguments)
    }

    /// Use a caller-supplied call id
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }
}

/// Generate a fresh call id
pub fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Correlation data passed through to the selected lane
///
/// The executor never interprets these values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Arbitrary extra keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Cancellation token for in-flight immediate calls
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set user ID
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set conversation ID
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Set message ID
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Set provider
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add an extra key
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Set cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// Serializable form of the context (cancellation token excluded)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Object(Map::new()))
    }
}

/// Outcome status of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Immediate call returned a result
    Success,

    /// Background unit of work accepted by the queue
    Queued,

    /// The call failed (unknown tool, lane error, timeout, enqueue failure)
    Error,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Uniform result record for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub call_id: String,
    pub name: String,
    pub status: ExecutionStatus,

    /// Functional result (immediate) or acknowledgment payload (background)
    pub result: Option<Value>,

    pub error: Option<String>,

    /// Lane the call was routed to; `None` when the tool was unknown
    pub execution_mode: Option<ExecutionMode>,

    pub duration_ms: u64,
}

impl ToolExecutionResult {
    /// Create a success result
    pub fn success(
        call_id: impl Into<String>,
        name: impl Into<String>,
        result: Value,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            status: ExecutionStatus::Success,
            result: Some(result),
            error: None,
            execution_mode: Some(ExecutionMode::Immediate),
            duration_ms,
        }
    }

    /// Create a queued result carrying an acknowledgment
    pub fn queued(
        call_id: impl Into<String>,
        name: impl Into<String>,
        acknowledgment: Value,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            status: ExecutionStatus::Queued,
            result: Some(acknowledgment),
            error: None,
            execution_mode: Some(ExecutionMode::Background),
            duration_ms,
        }
    }

    /// Create an error result
    pub fn error(
        call_id: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
        execution_mode: Option<ExecutionMode>,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            status: ExecutionStatus::Error,
            result: None,
            error: Some(error.into()),
            execution_mode,
            duration_ms,
        }
    }

    /// Check if this result represents success
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Check if this result represents a queued unit of work
    pub fn is_queued(&self) -> bool {
        self.status == ExecutionStatus::Queued
    }

    /// Check if this result represents an error
    pub fn is_error(&self) -> bool {
        self.status == ExecutionStatus::Error
    }
}
