//! Execution statistics collector

use crate::tools::{ExecutionMode, ToolExecutionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Why a call ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Succeeded,
    Queued,
    UnknownTool,
    Failed,
    TimedOut,
    Cancelled,
    EnqueueFailed,
}

impl CallOutcome {
    /// Whether the outcome is reported as `status=error`
    pub fn is_error(&self) -> bool {
        !matches!(self, CallOutcome::Succeeded | CallOutcome::Queued)
    }
}

#[derive(Debug, Default)]
struct ToolCounters {
    calls: u64,
    errors: u64,
    total_duration_ms: u64,
}

/// Per-tool statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStats {
    pub calls: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
}

/// Aggregated call statistics
///
/// Counters are lock-free; only the per-tool breakdown takes a short lock.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    total_calls: AtomicU64,
    succeeded: AtomicU64,
    queued: AtomicU64,
    failed: AtomicU64,
    unknown_tools: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
    enqueue_failures: AtomicU64,
    immediate_calls: AtomicU64,
    background_calls: AtomicU64,
    total_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
    per_tool: Mutex<HashMap<String, ToolCounters>>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call
    pub fn record(&self, result: &ToolExecutionResult, outcome: CallOutcome) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let bucket = match outcome {
            CallOutcome::Succeeded => &self.succeeded,
            CallOutcome::Queued => &self.queued,
            _ => &self.failed,
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        match outcome {
            CallOutcome::UnknownTool => {
                self.unknown_tools.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::TimedOut => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::Cancelled => {
                self.cancellations.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::EnqueueFailed => {
                self.enqueue_failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        match result.execution_mode {
            Some(ExecutionMode::Immediate) => {
                self.immediate_calls.fetch_add(1, Ordering::Relaxed);
            }
            Some(ExecutionMode::Background) => {
                self.background_calls.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }

        self.total_duration_ms
            .fetch_add(result.duration_ms, Ordering::Relaxed);
        self.max_duration_ms
            .fetch_max(result.duration_ms, Ordering::Relaxed);

        // Unknown names are caller-supplied and only counted in aggregate
        if matches!(outcome, CallOutcome::UnknownTool) {
            return;
        }
        if let Ok(mut per_tool) = self.per_tool.lock() {
            let counters = per_tool.entry(result.name.clone()).or_default();
            counters.calls += 1;
            if outcome.is_error() {
                counters.errors += 1;
            }
            counters.total_duration_ms += result.duration_ms;
        }
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> ExecutionStatsSnapshot {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);

        let per_tool = self
            .per_tool
            .lock()
            .map(|per_tool| {
                per_tool
                    .iter()
                    .map(|(name, c)| {
                        (
                            name.clone(),
                            ToolCallStats {
                                calls: c.calls,
                                errors: c.errors,
                                total_duration_ms: c.total_duration_ms,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        ExecutionStatsSnapshot {
            total_calls,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unknown_tools: self.unknown_tools.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
            immediate_calls: self.immediate_calls.load(Ordering::Relaxed),
            background_calls: self.background_calls.load(Ordering::Relaxed),
            total_duration_ms,
            avg_duration_ms: if total_calls == 0 {
                0.0
            } else {
                total_duration_ms as f64 / total_calls as f64
            },
            max_duration_ms: self.max_duration_ms.load(Ordering::Relaxed),
            per_tool,
            captured_at: Utc::now(),
        }
    }
}

/// Serializable statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatsSnapshot {
    pub total_calls: u64,
    pub succeeded: u64,
    pub queued: u64,
    /// Every `status=error` result, whatever the cause
    pub failed: u64,
    pub unknown_tools: u64,
    pub timeouts: u64,
    pub cancellations: u64,
    pub enqueue_failures: u64,
    pub immediate_calls: u64,
    pub background_calls: u64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub per_tool: BTreeMap<String, ToolCallStats>,
    pub captured_at: DateTime<Utc>,
}

impl ExecutionStatsSnapshot {
    /// Fraction of calls that did not end in error
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        (self.succeeded + self.queued) as f64 / self.total_calls as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_partition_total() {
        let stats = ExecutionStats::new();
        stats.record(
            &ToolExecutionResult::success("c1", "search", json!(1), 10),
            CallOutcome::Succeeded,
        );
        stats.record(
            &ToolExecutionResult::queued("c2", "send_email", json!({}), 2),
            CallOutcome::Queued,
        );
        stats.record(
            &ToolExecutionResult::error("c3", "bogus", "unknown tool: 'bogus'", None, 0),
            CallOutcome::UnknownTool,
        );
        stats.record(
            &ToolExecutionResult::error("c4", "search", "timed out", Some(ExecutionMode::Immediate), 50),
            CallOutcome::TimedOut,
        );

        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 4);
        assert_eq!(snap.succeeded + snap.queued + snap.failed, snap.total_calls);
        assert_eq!(snap.unknown_tools, 1);
        assert_eq!(snap.timeouts, 1);
        assert_eq!(snap.immediate_calls, 2);
        assert_eq!(snap.background_calls, 1);
        assert_eq!(snap.max_duration_ms, 50);
        assert_eq!(snap.per_tool["search"].calls, 2);
        assert_eq!(snap.per_tool["search"].errors, 1);
        assert!((snap.success_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_names_skip_per_tool() {
        let stats = ExecutionStats::new();
        for i in 0..100 {
            let name = format!("bogus_{}", i);
            stats.record(
                &ToolExecutionResult::error("c", name.as_str(), "unknown tool", None, 0),
                CallOutcome::UnknownTool,
            );
        }

        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 100);
        assert_eq!(snap.unknown_tools, 100);
        assert_eq!(snap.failed, 100);
        assert!(snap.per_tool.is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = ExecutionStats::new().snapshot();
        assert_eq!(snap.total_calls, 0);
        assert_eq!(snap.avg_duration_ms, 0.0);
        assert_eq!(snap.success_rate(), 1.0);

        let value = serde_json::to_value(&snap).unwrap();
        assert!(value["per_tool"].as_object().unwrap().is_empty());
    }
}
