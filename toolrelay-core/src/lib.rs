//! # Toolrelay - Unified tool discovery and execution routing
//!
//! Toolrelay gives an AI conversation service one catalog of callable tools
//! drawn from two kinds of sources:
//! - External tool servers, spoken to over MCP and executed immediately
//! - In-process event listeners, executed in the background through a
//!   durable queue
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolrelay_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ToolRelayConfig::load()?;
//!     let relay = ToolRelay::from_config(config).await?;
//!
//!     // Discover every configured source
//!     let report = relay.registry().refresh(false).await;
//!     println!("{} tools found", report.tools_found);
//!
//!     // Route a batch of calls requested by the model
//!     let calls = vec![ToolCallRequest::from_value(
//!         "search_docs",
//!         serde_json::json!({"query": "rate limits"}),
//!     )];
//!     let results = relay
//!         .executor()
//!         .process_tool_calls(calls, &ExecutionContext::new())
//!         .await?;
//!     for result in results {
//!         println!("{} -> {}", result.call_id, result.status);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Registry**: merges discovered descriptors into an immutable catalog
//!   snapshot, cached with a time-to-live
//! - **Executor**: resolves calls against one snapshot and routes them by
//!   execution mode
//! - **Lanes**: immediate calls go through the external adapter under a
//!   timeout; background calls only enqueue a job

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod mcp;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheStore, FileCacheStore, InMemoryCacheStore};
    pub use crate::config::{
        CacheBackend, ConfigBuilder, QueueBackend, QueueConfig, RegistryConfig, ToolRelayConfig,
    };
    pub use crate::discovery::{
        EventListenerRegistry, ExternalServerAdapter, ListenerRegistration,
        LocalRegistrationAdapter, RawToolInfo, ServerDiscovery,
    };
    pub use crate::error::{Result, ToolRelayError};
    pub use crate::executor::{
        AdapterImmediateLane, BackgroundLane, ExecutorConfig, ImmediateLane,
        QueueBackgroundLane, ToolExecutor,
    };
    pub use crate::mcp::{McpServerAdapter, McpServerConfig};
    pub use crate::metrics::{ExecutionStats, ExecutionStatsSnapshot};
    pub use crate::queue::{BackgroundJob, DurableQueue, FileQueue, InMemoryQueue};
    pub use crate::registry::{Catalog, DiscoveryReport, RegistryStats, ToolRegistry};
    pub use crate::relay::{ToolRelay, ToolRelayBuilder};
    pub use crate::tools::{
        ExecutionContext, ExecutionMode, ExecutionStatus, ToolCallRequest, ToolDescriptor,
        ToolExecutionResult, ToolOrigin, ToolType,
    };
}
