//! Executor tests with fake lanes

use super::*;
use crate::cache::InMemoryCacheStore;
use crate::discovery::{
    EventListenerRegistry, ExternalServerAdapter, ListenerRegistration, RawToolInfo,
    ServerDiscovery,
};
use crate::error::{Result, ToolRelayError};
use crate::queue::InMemoryQueue;
use crate::registry::ToolRegistry;
use crate::tools::{
    ExecutionContext, ExecutionMode, ExecutionStatus, ServerInfo, ToolCallRequest, ToolDescriptor,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One server exposing a fixed set of tools
struct StaticServer {
    tools: Vec<&'static str>,
}

#[async_trait]
impl ExternalServerAdapter for StaticServer {
    fn server_names(&self) -> Vec<String> {
        vec!["docs".to_string()]
    }

    async fn discover(&self, _server: &str) -> Result<ServerDiscovery> {
        Ok(ServerDiscovery {
            tools: self
                .tools
                .iter()
                .map(|t| RawToolInfo::new(*t, format!("{} tool", t), json!({})))
                .collect(),
            server_info: ServerInfo::new("docs", "fake", "1.0"),
        })
    }

    async fn invoke(
        &self,
        _server: &str,
        _tool: &str,
        _arguments: Map<String, Value>,
    ) -> Result<Value> {
        unreachable!("executor tests use FakeImmediate")
    }
}

/// Immediate lane whose behaviour depends on the tool name
#[derive(Default)]
struct FakeImmediate {
    invocations: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl ImmediateLane for FakeImmediate {
    async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        arguments: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Value> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match descriptor.name.as_str() {
            "slow_tool" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!("late"))
            }
            "failing_tool" => Err(ToolRelayError::execution("failing_tool", "backend down")),
            _ => {
                let delay = arguments
                    .get("delay_ms")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(json!({"tool": descriptor.name, "args": arguments}))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Background lane that records calls and can be made to fail
#[derive(Default)]
struct FakeBackground {
    enqueued: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl BackgroundLane for FakeBackground {
    async fn enqueue(
        &self,
        call_id: &str,
        _descriptor: &ToolDescriptor,
        _arguments: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Value> {
        if self.fail {
            return Err(ToolRelayError::Enqueue("queue unavailable".to_string()));
        }
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"job_id": format!("job-{}", call_id), "queue": "fake"}))
    }
}

async fn registry(tools: Vec<&'static str>) -> Arc<ToolRegistry> {
    let local = EventListenerRegistry::new();
    local
        .register(
            "send_email",
            ListenerRegistration::new("EmailListener", "Send an email"),
        )
        .await
        .unwrap();

    Arc::new(
        ToolRegistry::new(Arc::new(InMemoryCacheStore::new()))
            .with_external_adapter(Arc::new(StaticServer { tools }))
            .with_local_adapter(Arc::new(local)),
    )
}

async fn executor() -> (ToolExecutor, Arc<FakeImmediate>, Arc<FakeBackground>) {
    let immediate = Arc::new(FakeImmediate::default());
    let background = Arc::new(FakeBackground::default());
    let executor = ToolExecutor::new(
        registry(vec!["search_docs", "slow_tool", "failing_tool"]).await,
        immediate.clone(),
        background.clone(),
    );
    (executor, immediate, background)
}

fn call(name: &str, call_id: &str) -> ToolCallRequest {
    ToolCallRequest::new(name, Map::new()).with_call_id(call_id)
}

#[tokio::test]
async fn test_mixed_batch_routes_by_mode() {
    let (executor, immediate, background) = executor().await;

    let results = executor
        .process_tool_calls(
            vec![
                call("send_email", "c1"),
                call("search_docs", "c2"),
                call("bogus", "c3"),
            ],
            &ExecutionContext::new(),
        )
        .await
        .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);

    assert_eq!(results[0].status, ExecutionStatus::Queued);
    assert_eq!(results[0].execution_mode, Some(ExecutionMode::Background));
    assert_eq!(results[0].result.as_ref().unwrap()["job_id"], "job-c1");

    assert_eq!(results[1].status, ExecutionStatus::Success);
    assert_eq!(results[1].execution_mode, Some(ExecutionMode::Immediate));

    assert_eq!(results[2].status, ExecutionStatus::Error);
    assert_eq!(results[2].execution_mode, None);
    assert!(results[2].error.as_deref().unwrap().contains("unknown tool"));

    assert_eq!(immediate.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(background.enqueued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_tool_among_valid_calls() {
    let (executor, _, _) = executor().await;
    let calls = vec![
        call("search_docs", "a"),
        call("send_email", "b"),
        call("nope", "c"),
        call("search_docs", "d"),
    ];

    let results = executor
        .process_tool_calls(calls, &ExecutionContext::new())
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    let errors: Vec<_> = results.iter().filter(|r| r.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name, "nope");
    assert_eq!(errors[0].error.as_deref(), Some("unknown tool: 'nope'"));
}

#[tokio::test]
async fn test_duplicate_call_ids_rejected() {
    let (executor, immediate, _) = executor().await;

    let err = executor
        .process_tool_calls(
            vec![call("search_docs", "same"), call("send_email", "same")],
            &ExecutionContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ToolRelayError::InvalidRequest(_)));
    assert_eq!(immediate.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_batch() {
    let (executor, _, _) = executor().await;
    let results = executor
        .process_tool_calls(Vec::new(), &ExecutionContext::new())
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_error_result() {
    let (executor, _, _) = executor().await;
    let executor = executor.with_config(
        ExecutorConfig::default().with_tool_timeout("slow_tool", Duration::from_millis(50)),
    );

    let results = executor
        .process_tool_calls(
            vec![call("slow_tool", "s"), call("search_docs", "f")],
            &ExecutionContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(results[0].status, ExecutionStatus::Error);
    assert!(results[0].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(results[1].status, ExecutionStatus::Success);

    let stats = executor.stats();
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_lane_failure_is_error_result() {
    let (executor, _, _) = executor().await;
    let result = executor
        .execute_tool_call("failing_tool", Map::new(), &ExecutionContext::new())
        .await;

    assert!(result.is_error());
    assert!(result.error.as_deref().unwrap().contains("backend down"));
    assert_eq!(result.execution_mode, Some(ExecutionMode::Immediate));
    assert!(result.call_id.starts_with("call_"));
}

#[tokio::test]
async fn test_enqueue_failure_is_error_not_queued() {
    let immediate = Arc::new(FakeImmediate::default());
    let background = Arc::new(FakeBackground {
        enqueued: AtomicUsize::new(0),
        fail: true,
    });
    let executor = ToolExecutor::new(registry(vec![]).await, immediate, background);

    let result = executor
        .execute_tool_call("send_email", Map::new(), &ExecutionContext::new())
        .await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.execution_mode, Some(ExecutionMode::Background));
    assert!(result.result.is_none());
    assert_eq!(executor.stats().enqueue_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_immediate_call() {
    let (executor, _, _) = executor().await;
    let token = CancellationToken::new();
    let context = ExecutionContext::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let result = executor
        .execute_tool_call("slow_tool", Map::new(), &context)
        .await;
    canceller.await.unwrap();

    assert!(result.is_error());
    assert!(result.error.as_deref().unwrap().contains("cancelled"));
    assert_eq!(executor.stats().cancellations, 1);
}

#[tokio::test]
async fn test_already_cancelled_context_skips_lane() {
    let (executor, immediate, _) = executor().await;
    let token = CancellationToken::new();
    token.cancel();
    let context = ExecutionContext::new().with_cancellation(token);

    let result = executor
        .execute_tool_call("search_docs", Map::new(), &context)
        .await;

    assert!(result.is_error());
    assert_eq!(immediate.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_results_keep_input_order_under_concurrency() {
    let (executor, immediate, _) = executor().await;
    let executor = executor.with_config(ExecutorConfig::default().with_max_concurrency(2));

    let calls: Vec<_> = [40u64, 5, 25, 1, 10]
        .iter()
        .enumerate()
        .map(|(i, delay)| {
            let mut args = Map::new();
            args.insert("delay_ms".to_string(), json!(delay));
            ToolCallRequest::new("search_docs", args).with_call_id(format!("c{}", i))
        })
        .collect();

    let results = executor
        .process_tool_calls(calls, &ExecutionContext::new())
        .await
        .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4"]);
    assert!(results.iter().all(|r| r.is_success()));
    assert!(immediate.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_preflight_validation_runs_no_lane() {
    let (executor, immediate, background) = executor().await;

    let err = executor
        .validate_calls(&[call("bogus_tool", "x")])
        .await
        .unwrap_err();
    match err {
        ToolRelayError::UnknownTools(missing) => assert_eq!(missing, vec!["bogus_tool"]),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(immediate.invocations.load(Ordering::SeqCst), 0);
    assert_eq!(background.enqueued.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_one_stats_entry_per_call() {
    let (executor, _, _) = executor().await;
    executor
        .process_tool_calls(
            vec![
                call("search_docs", "1"),
                call("send_email", "2"),
                call("missing", "3"),
                call("failing_tool", "4"),
            ],
            &ExecutionContext::new(),
        )
        .await
        .unwrap();

    let stats = executor.stats();
    assert_eq!(stats.total_calls, 4);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.unknown_tools, 1);
    assert_eq!(stats.immediate_calls, 2);
    assert_eq!(stats.background_calls, 1);
}

#[tokio::test]
async fn test_queue_lane_end_to_end() {
    let queue = Arc::new(InMemoryQueue::new("tool_jobs"));
    let executor = ToolExecutor::new(
        registry(vec![]).await,
        Arc::new(FakeImmediate::default()),
        Arc::new(QueueBackgroundLane::new(queue.clone())),
    );

    let mut args = Map::new();
    args.insert("to".to_string(), json!("ops@example.com"));
    let context = ExecutionContext::new().with_user_id("u1");

    let result = executor
        .execute_tool_call("send_email", args, &context)
        .await;

    assert!(result.is_queued());
    let jobs = queue.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].call_id, result.call_id);
    assert_eq!(jobs[0].context.user_id.as_deref(), Some("u1"));

    let ack = result.result.unwrap();
    assert_eq!(ack["job_id"], jobs[0].job_id.as_str());
    assert_eq!(ack["queue"], "tool_jobs");
    assert!(ack["dedupe_key"].is_string());
    assert!(ack["enqueued_at"].is_string());
}
