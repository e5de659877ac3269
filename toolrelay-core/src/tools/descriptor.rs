//! Tool descriptor definitions
//!
//! A descriptor is the normalized catalog entry for one tool, regardless of
//! whether it is served by an external tool server or an in-process event
//! listener. The origin is a closed enum, and the execution mode is derived
//! from it, so a descriptor can never pair an external tool with background
//! execution or a local event with immediate execution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Origin discriminator for a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    /// Served by an external tool server
    ExternalTool,

    /// Backed by an in-process event listener
    LocalEvent,
}

impl ToolType {
    /// All tool types, in reporting order
    pub fn all() -> &'static [ToolType] {
        &[ToolType::ExternalTool, ToolType::LocalEvent]
    }

    /// The execution mode tools of this type always use
    pub fn execution_mode(&self) -> ExecutionMode {
        match self {
            ToolType::ExternalTool => ExecutionMode::Immediate,
            ToolType::LocalEvent => ExecutionMode::Background,
        }
    }

    /// Get the string name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::ExternalTool => "external_tool",
            ToolType::LocalEvent => "local_event",
        }
    }
}

impl std::fmt::Display for ToolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ToolType {
    type Err = crate::error::ToolRelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "external_tool" | "external" => Ok(ToolType::ExternalTool),
            "local_event" | "local" => Ok(ToolType::LocalEvent),
            other => Err(crate::error::ToolRelayError::InvalidRequest(format!(
                "Invalid tool type: {}",
                other
            ))),
        }
    }
}

/// Execution lane a tool is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Called now, result returned within the request
    Immediate,

    /// Durably enqueued, only an acknowledgment is returned
    Background,
}

impl ExecutionMode {
    /// All execution modes, in reporting order
    pub fn all() -> &'static [ExecutionMode] {
        &[ExecutionMode::Immediate, ExecutionMode::Background]
    }

    /// Get the string name of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Immediate => "immediate",
            ExecutionMode::Background => "background",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata reported by an external tool server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Configured server name
    pub name: String,

    /// Server implementation type (e.g. "stdio", or the name the server reports)
    pub server_type: String,

    /// Server version
    pub version: String,
}

impl ServerInfo {
    /// Create server info
    pub fn new(
        name: impl Into<String>,
        server_type: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            server_type: server_type.into(),
            version: version.into(),
        }
    }
}

/// Identity of an in-process listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerInfo {
    /// Local registration source tag
    pub source: String,

    /// Event name the listener is registered for
    pub event: String,

    /// Listener identity (e.g. handler type name)
    pub listener: String,
}

/// Where a tool comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOrigin {
    /// Served by an external tool server
    ExternalTool {
        /// Server that provides the tool
        server: ServerInfo,
    },

    /// Backed by an in-process event listener
    LocalEvent {
        /// Listener that handles the event
        listener: ListenerInfo,
    },
}

impl ToolOrigin {
    /// Tool type for this origin
    pub fn tool_type(&self) -> ToolType {
        match self {
            ToolOrigin::ExternalTool { .. } => ToolType::ExternalTool,
            ToolOrigin::LocalEvent { .. } => ToolType::LocalEvent,
        }
    }

    /// Server name or local source tag
    pub fn source(&self) -> &str {
        match self {
            ToolOrigin::ExternalTool { server } => &server.name,
            ToolOrigin::LocalEvent { listener } => &listener.source,
        }
    }
}

/// Normalized catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Globally unique tool name
    pub name: String,

    /// Human-readable description (never empty)
    pub description: String,

    /// JSON Schema object for the call arguments
    pub parameters: Value,

    /// Origin of the tool
    pub origin: ToolOrigin,

    /// Whether calls need credentials
    #[serde(default)]
    pub requires_auth: bool,

    /// Free-form grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ToolDescriptor {
    /// Create a descriptor for a tool served by an external server
    pub fn external(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        server: ServerInfo,
    ) -> Self {
        let name = name.into();
        let description = normalize_description(&name, description.into(), &server.name);
        Self {
            name,
            description,
            parameters: normalize_parameters(parameters),
            origin: ToolOrigin::ExternalTool { server },
            requires_auth: false,
            category: None,
        }
    }

    /// Create a descriptor for a tool backed by an event listener
    pub fn local_event(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        listener: ListenerInfo,
    ) -> Self {
        let name = name.into();
        let description = normalize_description(&name, description.into(), &listener.source);
        Self {
            name,
            description,
            parameters: normalize_parameters(parameters),
            origin: ToolOrigin::LocalEvent { listener },
            requires_auth: false,
            category: None,
        }
    }

    /// Set auth requirement
    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Set category
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Tool type (derived from origin)
    pub fn tool_type(&self) -> ToolType {
        self.origin.tool_type()
    }

    /// Execution mode (derived from type)
    pub fn execution_mode(&self) -> ExecutionMode {
        self.tool_type().execution_mode()
    }

    /// Server name or local source tag
    pub fn source(&self) -> &str {
        self.origin.source()
    }

    /// Flat summary for listing and rendering
    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            tool_type: self.tool_type(),
            execution_mode: self.execution_mode(),
            source: self.source().to_string(),
            requires_auth: self.requires_auth,
            category: self.category.clone(),
        }
    }

    /// Provider-facing function definition
    pub fn to_function_definition(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Summary of a tool for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub execution_mode: ExecutionMode,
    pub source: String,
    pub requires_auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn normalize_description(name: &str, description: String, source: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        format!("{} (provided by {})", name, source)
    } else {
        trimmed.to_string()
    }
}

/// Normalize a parameter schema into a JSON Schema object
///
/// `null` and non-object values become an empty object schema; objects
/// missing a `type` get `"type": "object"`.
pub fn normalize_parameters(parameters: Value) -> Value {
    match parameters {
        Value::Object(mut map) => {
            if !map.contains_key("type") {
                map.insert("type".to_string(), Value::String("object".to_string()));
            }
            if !map.contains_key("properties")
                && map.get("type").and_then(Value::as_str) == Some("object")
            {
                map.insert("properties".to_string(), Value::Object(Map::new()));
            }
            Value::Object(map)
        }
        _ => serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server() -> ServerInfo {
        ServerInfo::new("docs", "stdio", "1.0.0")
    }

    fn listener() -> ListenerInfo {
        ListenerInfo {
            source: "local_events".to_string(),
            event: "send_email".to_string(),
            listener: "EmailListener".to_string(),
        }
    }

    #[test]
    fn test_mode_follows_type() {
        let external = ToolDescriptor::external("search_docs", "Search", json!({}), server());
        assert_eq!(external.tool_type(), ToolType::ExternalTool);
        assert_eq!(external.execution_mode(), ExecutionMode::Immediate);
        assert_eq!(external.source(), "docs");

        let local = ToolDescriptor::local_event("send_email", "Send", json!({}), listener());
        assert_eq!(local.tool_type(), ToolType::LocalEvent);
        assert_eq!(local.execution_mode(), ExecutionMode::Background);
        assert_eq!(local.source(), "local_events");
    }

    #[test]
    fn test_empty_description_is_synthesized() {
        let tool = ToolDescriptor::external("search_docs", "   ", json!({}), server());
        assert_eq!(tool.description, "search_docs (provided by docs)");
    }

    #[test]
    fn test_parameters_normalized() {
        assert_eq!(
            normalize_parameters(Value::Null),
            json!({"type": "object", "properties": {}})
        );

        let normalized = normalize_parameters(json!({"required": ["q"]}));
        assert_eq!(normalized["type"], "object");
        assert_eq!(normalized["required"], json!(["q"]));
        assert!(normalized["properties"].is_object());

        let untouched = json!({"type": "object", "properties": {"q": {"type": "string"}}});
        assert_eq!(normalize_parameters(untouched.clone()), untouched);
    }

    #[test]
    fn test_summary_serialization() {
        let tool = ToolDescriptor::local_event("send_email", "Send an email", json!({}), listener())
            .with_category(Some("messaging".to_string()));
        let summary = serde_json::to_value(tool.summary()).unwrap();

        assert_eq!(summary["type"], "local_event");
        assert_eq!(summary["execution_mode"], "background");
        assert_eq!(summary["source"], "local_events");
        assert_eq!(summary["category"], "messaging");
    }

    #[test]
    fn test_descriptor_roundtrip_keeps_origin() {
        let tool = ToolDescriptor::external("search_docs", "Search", json!({}), server())
            .with_requires_auth(true);
        let parsed: ToolDescriptor =
            serde_json::from_str(&serde_json::to_string(&tool).unwrap()).unwrap();

        assert_eq!(parsed, tool);
        assert_eq!(parsed.execution_mode(), ExecutionMode::Immediate);
    }

    #[test]
    fn test_function_definition() {
        let tool = ToolDescriptor::external("search_docs", "Search docs", json!({}), server());
        let def = tool.to_function_definition();
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "search_docs");
        assert_eq!(def["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_tool_type_from_str() {
        assert_eq!("external_tool".parse::<ToolType>().unwrap(), ToolType::ExternalTool);
        assert_eq!("LOCAL".parse::<ToolType>().unwrap(), ToolType::LocalEvent);
        assert!("other".parse::<ToolType>().is_err());
    }
}
