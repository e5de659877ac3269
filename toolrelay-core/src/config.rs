//! Configuration types for toolrelay

use crate::cache::{CacheStore, FileCacheStore, InMemoryCacheStore};
use crate::discovery::{ListenerRegistration, DEFAULT_LOCAL_SOURCE};
use crate::error::{Result, ToolRelayError};
use crate::executor::ExecutorConfig;
use crate::mcp::McpServerConfig;
use crate::queue::{DurableQueue, FileQueue, InMemoryQueue};
use crate::registry::DEFAULT_CACHE_TTL;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default configuration file name
pub const CONFIG_FILE: &str = "toolrelay.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "TOOLRELAY_CONFIG_PATH";

/// Prefix for environment overrides (`TOOLRELAY_REGISTRY__CACHE_TTL=10m`)
pub const ENV_PREFIX: &str = "TOOLRELAY_";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolRelayConfig {
    /// Registry and discovery cache
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Executor timeouts and concurrency
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Background queue
    #[serde(default)]
    pub queue: QueueConfig,

    /// External tool servers, in merge order
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,

    /// Event listeners declared in configuration, keyed by event name
    #[serde(default)]
    pub local_events: BTreeMap<String, ListenerRegistration>,
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long a discovered catalog stays fresh
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub cache_ttl: Duration,

    /// Where discovery results are persisted
    #[serde(default)]
    pub cache: CacheBackend,

    /// Source tag for local event tools
    #[serde(default = "default_local_source_tag")]
    pub local_source_tag: String,
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_local_source_tag() -> String {
    DEFAULT_LOCAL_SOURCE.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: CacheBackend::default(),
            local_source_tag: default_local_source_tag(),
        }
    }
}

/// Cache store selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local, lost on exit
    Memory,

    /// One JSON file per key under `dir`
    File { dir: PathBuf },
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::File {
            dir: default_data_dir().join("cache"),
        }
    }
}

impl CacheBackend {
    /// Construct the configured store
    pub fn build(&self) -> Arc<dyn CacheStore> {
        match self {
            CacheBackend::Memory => Arc::new(InMemoryCacheStore::new()),
            CacheBackend::File { dir } => Arc::new(FileCacheStore::new(dir.clone())),
        }
    }
}

/// Background queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name reported in acknowledgments
    #[serde(default = "default_queue_name")]
    pub name: String,

    #[serde(default)]
    pub backend: QueueBackend,
}

fn default_queue_name() -> String {
    "tool_jobs".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            backend: QueueBackend::default(),
        }
    }
}

impl QueueConfig {
    /// Construct the configured queue
    pub fn build(&self) -> Arc<dyn DurableQueue> {
        match &self.backend {
            QueueBackend::Memory => Arc::new(InMemoryQueue::new(&self.name)),
            QueueBackend::File { path } => Arc::new(FileQueue::new(&self.name, path.clone())),
        }
    }
}

/// Queue store selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueBackend {
    /// Process-local, lost on exit
    Memory,

    /// Append-only JSON lines at `path`
    File { path: PathBuf },
}

impl Default for QueueBackend {
    fn default() -> Self {
        QueueBackend::File {
            path: default_data_dir().join("queue").join("tool_jobs.jsonl"),
        }
    }
}

/// Base directory for persisted state
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolrelay")
}

/// Builder for ToolRelayConfig
pub struct ConfigBuilder {
    config: ToolRelayConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ToolRelayConfig::default(),
        }
    }

    /// Set registry configuration
    pub fn registry(mut self, config: RegistryConfig) -> Self {
        self.config.registry = config;
        self
    }

    /// Set executor configuration
    pub fn executor(mut self, config: ExecutorConfig) -> Self {
        self.config.executor = config;
        self
    }

    /// Set queue configuration
    pub fn queue(mut self, config: QueueConfig) -> Self {
        self.config.queue = config;
        self
    }

    /// Add an external tool server
    pub fn server(mut self, server: McpServerConfig) -> Self {
        self.config.servers.push(server);
        self
    }

    /// Declare a local event listener
    pub fn local_event(mut self, event: impl Into<String>, registration: ListenerRegistration) -> Self {
        self.config.local_events.insert(event.into(), registration);
        self
    }

    /// Keep cache and queue in memory
    pub fn in_memory(mut self) -> Self {
        self.config.registry.cache = CacheBackend::Memory;
        self.config.queue.backend = QueueBackend::Memory;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ToolRelayConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRelayConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (toolrelay.toml or path from TOOLRELAY_CONFIG_PATH)
    /// 3. Environment variable overrides (`TOOLRELAY_` prefix, `__` nesting)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is malformed or fails validation.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_FILE.to_string());
        Self::from_figment(Self::layered(file))
    }

    /// Load configuration from a specific file path.
    ///
    /// Environment overrides still apply on top of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolRelayError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        Self::from_figment(Self::layered(path))
    }

    fn layered(file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(ToolRelayConfig::default()))
            .merge(Toml::file(file.as_ref()))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["CONFIG_PATH"])
                    .split("__"),
            )
    }

    /// Parse configuration from a TOML string (defaults fill the gaps)
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let figment =
            Figment::from(Serialized::defaults(ToolRelayConfig::default())).merge(Toml::string(toml));
        Self::from_figment(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: ToolRelayConfig = figment.extract().map_err(|e| {
            ToolRelayError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate server names, empty server commands,
    /// a zero cache TTL, zero concurrency or an empty queue name.
    pub fn validate(&self) -> Result<()> {
        if self.registry.cache_ttl.is_zero() {
            return Err(ToolRelayError::Configuration(
                "registry.cache_ttl must be greater than zero".to_string(),
            ));
        }

        if self.executor.max_concurrency == 0 {
            return Err(ToolRelayError::Configuration(
                "executor.max_concurrency must be greater than zero".to_string(),
            ));
        }

        if self.queue.name.trim().is_empty() {
            return Err(ToolRelayError::Configuration(
                "queue.name must not be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ToolRelayError::Configuration(
                    "server name must not be empty".to_string(),
                ));
            }
            if server.command.trim().is_empty() {
                return Err(ToolRelayError::Configuration(format!(
                    "server '{}' has no command",
                    server.name
                )));
            }
            if !names.insert(server.name.as_str()) {
                return Err(ToolRelayError::Configuration(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
            if server.name == self.registry.local_source_tag {
                return Err(ToolRelayError::Configuration(format!(
                    "server name '{}' clashes with the local source tag",
                    server.name
                )));
            }
        }

        for (event, registration) in &self.local_events {
            if registration.listener.trim().is_empty() {
                return Err(ToolRelayError::Configuration(format!(
                    "local event '{}' has no listener",
                    event
                )));
            }
        }

        Ok(())
    }
}
