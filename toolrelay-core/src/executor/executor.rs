//! Tool executor: resolves calls against the catalog and routes them

use super::lanes::{BackgroundLane, ImmediateLane};
use crate::error::{Result, ToolRelayError};
use crate::metrics::{CallOutcome, ExecutionStats, ExecutionStatsSnapshot};
use crate::registry::{Catalog, ToolRegistry};
use crate::tools::{
    ExecutionContext, ExecutionMode, ToolCallRequest, ToolDescriptor, ToolExecutionResult,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Default bound on one immediate call
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of calls in flight per batch
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout for immediate calls without an override
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub default_timeout: Duration,

    /// Per-tool timeout overrides
    #[serde(with = "humantime_map", default)]
    pub tool_timeouts: HashMap<String, Duration>,

    /// Calls in flight per batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_timeout() -> Duration {
    DEFAULT_TOOL_TIMEOUT
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TOOL_TIMEOUT,
            tool_timeouts: HashMap::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ExecutorConfig {
    /// Set the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_name.into(), timeout);
        self
    }

    /// Set the concurrency bound
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Timeout for a specific tool
    pub fn timeout_for(&self, tool_name: &str) -> Duration {
        self.tool_timeouts
            .get(tool_name)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

/// Serde helpers for `HashMap<String, Duration>` in humantime format
mod humantime_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;
    use std::time::Duration;

    pub fn serialize<S>(map: &HashMap<String, Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let readable: HashMap<&String, humantime_serde::Serde<&Duration>> = map
            .iter()
            .map(|(k, v)| (k, humantime_serde::Serde::from(v)))
            .collect();
        readable.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let readable: HashMap<String, humantime_serde::Serde<Duration>> =
            HashMap::deserialize(deserializer)?;
        Ok(readable
            .into_iter()
            .map(|(k, v)| (k, v.into_inner()))
            .collect())
    }
}

/// Routes tool calls to the immediate or background lane
///
/// Every call produces exactly one [`ToolExecutionResult`] and one
/// statistics entry; per-call failures never abort the batch.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    immediate: Arc<dyn ImmediateLane>,
    background: Arc<dyn BackgroundLane>,
    config: ExecutorConfig,
    stats: Arc<ExecutionStats>,
}

impl ToolExecutor {
    /// Create an executor with default configuration
    pub fn new(
        registry: Arc<ToolRegistry>,
        immediate: Arc<dyn ImmediateLane>,
        background: Arc<dyn BackgroundLane>,
    ) -> Self {
        Self {
            registry,
            immediate,
            background,
            config: ExecutorConfig::default(),
            stats: Arc::new(ExecutionStats::new()),
        }
    }

    /// Set configuration
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a statistics collector with other components
    pub fn with_stats(mut self, stats: Arc<ExecutionStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Snapshot of call statistics
    pub fn stats(&self) -> ExecutionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Pre-flight check that every requested tool exists
    ///
    /// Fails with `UnknownTools` before any lane runs.
    pub async fn validate_calls(&self, calls: &[ToolCallRequest]) -> Result<Vec<ToolDescriptor>> {
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        self.registry.validate_requested(&names).await
    }

    /// Execute a batch of calls
    ///
    /// Results come back in input order. Only programmer errors (duplicate
    /// call ids) are returned as `Err`; everything else is a per-call
    /// result.
    pub async fn process_tool_calls(
        &self,
        calls: Vec<ToolCallRequest>,
        context: &ExecutionContext,
    ) -> Result<Vec<ToolExecutionResult>> {
        let mut seen = HashSet::new();
        for call in &calls {
            if !seen.insert(call.call_id.as_str()) {
                return Err(ToolRelayError::InvalidRequest(format!(
                    "duplicate call_id '{}' in batch",
                    call.call_id
                )));
            }
        }

        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let catalog = self.registry.get_all_tools().await;
        let concurrency = self.config.max_concurrency.max(1);
        let total = calls.len();

        let results: Vec<ToolExecutionResult> = stream::iter(calls)
            .map(|call| self.run_call(&catalog, call, context))
            .buffered(concurrency)
            .collect()
            .await;

        tracing::debug!(
            calls = total,
            errors = results.iter().filter(|r| r.is_error()).count(),
            "Tool call batch complete"
        );

        Ok(results)
    }

    /// Execute one call
    pub async fn execute_tool_call(
        &self,
        name: impl Into<String>,
        arguments: Map<String, Value>,
        context: &ExecutionContext,
    ) -> ToolExecutionResult {
        let catalog = self.registry.get_all_tools().await;
        self.run_call(&catalog, ToolCallRequest::new(name, arguments), context)
            .await
    }

    async fn run_call(
        &self,
        catalog: &Catalog,
        call: ToolCallRequest,
        context: &ExecutionContext,
    ) -> ToolExecutionResult {
        let started = Instant::now();

        let Some(descriptor) = catalog.get(&call.name) else {
            tracing::debug!(call_id = %call.call_id, tool = %call.name, "Unknown tool requested");
            let result = ToolExecutionResult::error(
                call.call_id,
                call.name.clone(),
                ToolRelayError::UnknownTool(call.name).to_string(),
                None,
                elapsed_ms(started),
            );
            self.stats.record(&result, CallOutcome::UnknownTool);
            return result;
        };

        tracing::debug!(
            call_id = %call.call_id,
            tool = %descriptor.name,
            mode = %descriptor.execution_mode(),
            source = %descriptor.source(),
            "Dispatching tool call"
        );

        let (result, outcome) = match descriptor.execution_mode() {
            ExecutionMode::Immediate => self.run_immediate(descriptor, call, context, started).await,
            ExecutionMode::Background => {
                self.run_background(descriptor, call, context, started).await
            }
        };

        self.stats.record(&result, outcome);
        result
    }

    async fn run_immediate(
        &self,
        descriptor: &ToolDescriptor,
        call: ToolCallRequest,
        context: &ExecutionContext,
        started: Instant,
    ) -> (ToolExecutionResult, CallOutcome) {
        let mode = Some(ExecutionMode::Immediate);

        if context.is_cancelled() {
            let error = ToolRelayError::Cancelled(call.name.clone());
            return (
                ToolExecutionResult::error(call.call_id, call.name, error.to_string(), mode, 0),
                CallOutcome::Cancelled,
            );
        }

        let tool_timeout = self.config.timeout_for(&descriptor.name);
        let execution = self.immediate.invoke(descriptor, call.arguments, context);

        let outcome = if let Some(token) = &context.cancellation {
            tokio::select! {
                _ = token.cancelled() => Err(ToolRelayError::Cancelled(call.name.clone())),
                res = timeout(tool_timeout, execution) => {
                    res.unwrap_or_else(|_| Err(ToolRelayError::Timeout {
                        tool: call.name.clone(),
                        timeout: tool_timeout,
                    }))
                }
            }
        } else {
            timeout(tool_timeout, execution)
                .await
                .unwrap_or_else(|_| {
                    Err(ToolRelayError::Timeout {
                        tool: call.name.clone(),
                        timeout: tool_timeout,
                    })
                })
        };

        let duration_ms = elapsed_ms(started);
        match outcome {
            Ok(value) => (
                ToolExecutionResult::success(call.call_id, call.name, value, duration_ms),
                CallOutcome::Succeeded,
            ),
            Err(e) => {
                let kind = match &e {
                    ToolRelayError::Timeout { .. } => CallOutcome::TimedOut,
                    ToolRelayError::Cancelled(_) => CallOutcome::Cancelled,
                    _ => CallOutcome::Failed,
                };
                tracing::warn!(call_id = %call.call_id, tool = %call.name, error = %e, "Tool call failed");
                (
                    ToolExecutionResult::error(call.call_id, call.name, e.to_string(), mode, duration_ms),
                    kind,
                )
            }
        }
    }

    async fn run_background(
        &self,
        descriptor: &ToolDescriptor,
        call: ToolCallRequest,
        context: &ExecutionContext,
        started: Instant,
    ) -> (ToolExecutionResult, CallOutcome) {
        let result = self
            .background
            .enqueue(&call.call_id, descriptor, call.arguments, context)
            .await;

        let duration_ms = elapsed_ms(started);
        match result {
            Ok(acknowledgment) => (
                ToolExecutionResult::queued(call.call_id, call.name, acknowledgment, duration_ms),
                CallOutcome::Queued,
            ),
            Err(e) => {
                tracing::warn!(call_id = %call.call_id, tool = %call.name, error = %e, "Failed to enqueue tool call");
                (
                    ToolExecutionResult::error(
                        call.call_id,
                        call.name,
                        e.to_string(),
                        Some(ExecutionMode::Background),
                        duration_ms,
                    ),
                    CallOutcome::EnqueueFailed,
                )
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
