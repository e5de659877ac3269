//! In-process event listener registrations

use crate::error::{Result, ToolRelayError};
use crate::tools::{ListenerInfo, ToolDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Default source tag for local event tools
pub const DEFAULT_LOCAL_SOURCE: &str = "local_events";

/// Metadata for one event listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerRegistration {
    /// Listener identity (e.g. handler type name)
    pub listener: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: Value,

    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ListenerRegistration {
    /// Create a registration
    pub fn new(listener: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            listener: listener.into(),
            description: description.into(),
            parameters: Value::Null,
            requires_auth: false,
            category: None,
        }
    }

    /// Set parameter schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
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

    /// Normalize into a catalog descriptor
    pub fn into_descriptor(self, event: &str, source: &str) -> ToolDescriptor {
        let listener = ListenerInfo {
            source: source.to_string(),
            event: event.to_string(),
            listener: self.listener,
        };
        ToolDescriptor::local_event(event, self.description, self.parameters, listener)
            .with_requires_auth(self.requires_auth)
            .with_category(self.category)
    }
}

/// Reads in-process listener registrations
#[async_trait]
pub trait LocalRegistrationAdapter: Send + Sync {
    /// Source tag attributed to every local tool
    fn source_tag(&self) -> &str;

    /// Current registrations keyed by event name
    async fn registrations(&self) -> Result<BTreeMap<String, ListenerRegistration>>;
}

/// Concrete registry of event listeners
///
/// Hosts register listeners at startup; the tool registry reads them on
/// every discovery cycle.
pub struct EventListenerRegistry {
    source_tag: String,
    listeners: RwLock<BTreeMap<String, ListenerRegistration>>,
}

impl EventListenerRegistry {
    /// Create an empty registry with the default source tag
    pub fn new() -> Self {
        Self::with_source_tag(DEFAULT_LOCAL_SOURCE)
    }

    /// Create an empty registry with a custom source tag
    pub fn with_source_tag(source_tag: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            listeners: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a listener for an event
    ///
    /// Returns an error if the event already has a listener.
    pub async fn register(
        &self,
        event: impl Into<String>,
        registration: ListenerRegistration,
    ) -> Result<()> {
        let event = event.into();
        let mut listeners = self.listeners.write().await;

        if listeners.contains_key(&event) {
            return Err(ToolRelayError::InvalidRequest(format!(
                "event '{}' already has a registered listener",
                event
            )));
        }

        tracing::debug!(event = %event, listener = %registration.listener, "Registered event listener");
        listeners.insert(event, registration);
        Ok(())
    }

    /// Remove a listener, returning its registration
    pub async fn unregister(&self, event: &str) -> Option<ListenerRegistration> {
        self.listeners.write().await.remove(event)
    }

    /// Number of registered events
    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Check if no listeners are registered
    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }
}

impl Default for EventListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalRegistrationAdapter for EventListenerRegistry {
    fn source_tag(&self) -> &str {
        &self.source_tag
    }

    async fn registrations(&self) -> Result<BTreeMap<String, ListenerRegistration>> {
        Ok(self.listeners.read().await.clone())
    }
}
