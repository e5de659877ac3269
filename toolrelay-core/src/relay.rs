//! Assembly of registry, lanes and executor from configuration

use crate::cache::CacheStore;
use crate::config::ToolRelayConfig;
use crate::discovery::{EventListenerRegistry, LocalRegistrationAdapter};
use crate::error::Result;
use crate::executor::{AdapterImmediateLane, QueueBackgroundLane, ToolExecutor};
use crate::mcp::{McpServerAdapter, ProcessConnector, TransportConnector};
use crate::queue::DurableQueue;
use crate::registry::ToolRegistry;
use std::sync::Arc;

/// A fully wired registry and executor
pub struct ToolRelay {
    config: ToolRelayConfig,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    servers: Arc<McpServerAdapter>,
    listeners: Arc<EventListenerRegistry>,
}

impl ToolRelay {
    /// Start building from a configuration
    pub fn builder(config: ToolRelayConfig) -> ToolRelayBuilder {
        ToolRelayBuilder::new(config)
    }

    /// Wire everything with default backends
    pub async fn from_config(config: ToolRelayConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn config(&self) -> &ToolRelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// In-process listener registry (pre-populated from `local_events`)
    pub fn listeners(&self) -> &Arc<EventListenerRegistry> {
        &self.listeners
    }

    /// Close all server connections
    pub async fn shutdown(&self) {
        self.servers.disconnect_all().await;
        tracing::debug!("Closed external server connections");
    }
}

/// Builder for [`ToolRelay`]
///
/// Cache, queue and connector default to what the configuration selects;
/// each can be replaced for embedding or tests.
pub struct ToolRelayBuilder {
    config: ToolRelayConfig,
    cache: Option<Arc<dyn CacheStore>>,
    queue: Option<Arc<dyn DurableQueue>>,
    connector: Option<Arc<dyn TransportConnector>>,
    local: Option<Arc<dyn LocalRegistrationAdapter>>,
}

impl ToolRelayBuilder {
    pub fn new(config: ToolRelayConfig) -> Self {
        Self {
            config,
            cache: None,
            queue: None,
            connector: None,
            local: None,
        }
    }

    /// Use a specific cache store
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a specific background queue
    pub fn queue(mut self, queue: Arc<dyn DurableQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Use a specific transport connector for external servers
    pub fn connector(mut self, connector: Arc<dyn TransportConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the local registration source
    ///
    /// Configured `local_events` are still registered into
    /// [`ToolRelay::listeners`] but no longer discovered.
    pub fn local_adapter(mut self, adapter: Arc<dyn LocalRegistrationAdapter>) -> Self {
        self.local = Some(adapter);
        self
    }

    /// Validate configuration and wire components
    pub async fn build(self) -> Result<ToolRelay> {
        self.config.validate()?;

        let cache = self
            .cache
            .unwrap_or_else(|| self.config.registry.cache.build());
        let queue = self.queue.unwrap_or_else(|| self.config.queue.build());
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(ProcessConnector));

        let servers = Arc::new(McpServerAdapter::with_connector(
            self.config.servers.clone(),
            connector,
        ));

        let listeners = Arc::new(EventListenerRegistry::with_source_tag(
            &self.config.registry.local_source_tag,
        ));
        for (event, registration) in &self.config.local_events {
            listeners.register(event, registration.clone()).await?;
        }
        let local = self
            .local
            .unwrap_or_else(|| listeners.clone() as Arc<dyn LocalRegistrationAdapter>);

        let registry = Arc::new(
            ToolRegistry::new(cache)
                .with_external_adapter(servers.clone())
                .with_local_adapter(local)
                .with_ttl(self.config.registry.cache_ttl),
        );

        let executor = ToolExecutor::new(
            registry.clone(),
            Arc::new(AdapterImmediateLane::new(servers.clone())),
            Arc::new(QueueBackgroundLane::new(queue)),
        )
        .with_config(self.config.executor.clone());

        tracing::info!(
            servers = self.config.servers.len(),
            local_events = self.config.local_events.len(),
            "Tool relay initialized"
        );

        Ok(ToolRelay {
            config: self.config,
            registry,
            executor,
            servers,
            listeners,
        })
    }
}
