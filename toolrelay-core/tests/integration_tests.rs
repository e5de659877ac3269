//! End-to-end tests for discovery, registry and execution routing
//!
//! External servers are served in memory through a custom transport
//! connector; cache and queue use the file backends in a temp dir.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use toolrelay_core::mcp::{JsonRpcResponse, MemoryTransport, Transport, TransportConnector};
use toolrelay_core::prelude::*;

/// In-memory MCP servers whose tool lists can change between discoveries
#[derive(Default)]
struct InMemoryServers {
    tools: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    connects: AtomicUsize,
}

impl InMemoryServers {
    fn with_server(self, command: &str, tools: &[&str]) -> Self {
        for tool in tools {
            self.add_tool(command, tool);
        }
        self.tools
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default();
        self
    }

    fn add_tool(&self, command: &str, tool: &str) {
        self.tools
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push(json!({
                "name": tool,
                "description": format!("{} tool", tool),
                "inputSchema": {"type": "object"}
            }));
    }
}

#[async_trait]
impl TransportConnector for InMemoryServers {
    async fn connect(&self, config: &McpServerConfig) -> Result<Box<dyn Transport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if !self.tools.lock().unwrap().contains_key(&config.command) {
            return Err(ToolRelayError::Transport(format!(
                "no such command: {}",
                config.command
            )));
        }

        let tools = self.tools.clone();
        let command = config.command.clone();
        Ok(Box::new(MemoryTransport::new(move |req| {
            let result = match req.method.as_str() {
                "initialize" => json!({"serverInfo": {"name": command, "version": "1.2.0"}}),
                "tools/list" => {
                    let listed = tools.lock().unwrap().get(&command).cloned().unwrap_or_default();
                    json!({ "tools": listed })
                }
                "tools/call" => {
                    let params = req.params.clone().unwrap_or(Value::Null);
                    json!({"content": [{
                        "type": "text",
                        "text": json!({"tool": params["name"], "echo": params["arguments"]}).to_string()
                    }]})
                }
                _ => return None,
            };
            Some(JsonRpcResponse::success(req.id.clone(), result))
        })))
    }
}

struct Harness {
    relay: ToolRelay,
    servers: Arc<InMemoryServers>,
    queue_path: std::path::PathBuf,
    _dir: TempDir,
}

fn config_in(dir: &TempDir, servers: &[(&str, &str)]) -> ToolRelayConfig {
    let mut builder = ConfigBuilder::new()
        .registry(RegistryConfig {
            cache: CacheBackend::File {
                dir: dir.path().join("cache"),
            },
            ..RegistryConfig::default()
        })
        .queue(QueueConfig {
            name: "tool_jobs".to_string(),
            backend: QueueBackend::File {
                path: dir.path().join("queue").join("jobs.jsonl"),
            },
        })
        .local_event(
            "send_email",
            ListenerRegistration::new("EmailListener", "Send an email")
                .with_parameters(json!({"type": "object", "properties": {"to": {"type": "string"}}})),
        );
    for (name, command) in servers {
        builder = builder.server(McpServerConfig::new(*name, *command));
    }
    builder.build()
}

async fn harness(servers: InMemoryServers, configured: &[(&str, &str)]) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let servers = Arc::new(servers);
    let config = config_in(&dir, configured);
    let queue_path = dir.path().join("queue").join("jobs.jsonl");

    let relay = ToolRelay::builder(config)
        .connector(servers.clone())
        .build()
        .await
        .expect("Failed to build relay");

    Harness {
        relay,
        servers,
        queue_path,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_mixed_batch_routes_each_call() {
    let servers = InMemoryServers::default().with_server("docs-mcp", &["search_docs"]);
    let h = harness(servers, &[("docs", "docs-mcp")]).await;

    let calls = vec![
        ToolCallRequest::from_value("send_email", json!({"to": "a@example.com"}))
            .with_call_id("call_1"),
        ToolCallRequest::from_value("search_docs", json!({"query": "limits"}))
            .with_call_id("call_2"),
        ToolCallRequest::from_value("bogus", json!({})).with_call_id("call_3"),
    ];
    let context = ExecutionContext::new().with_conversation_id("conv-42");

    let results = h
        .relay
        .executor()
        .process_tool_calls(calls, &context)
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["call_1", "call_2", "call_3"]);

    assert_eq!(results[0].status, ExecutionStatus::Queued);
    assert_eq!(results[0].execution_mode, Some(ExecutionMode::Background));

    assert_eq!(results[1].status, ExecutionStatus::Success);
    let value = results[1].result.as_ref().unwrap();
    assert_eq!(value["tool"], "search_docs");
    assert_eq!(value["echo"]["query"], "limits");

    assert_eq!(results[2].status, ExecutionStatus::Error);
    assert!(results[2].error.as_ref().unwrap().contains("unknown tool"));

    let queue = FileQueue::new("tool_jobs", &h.queue_path);
    let pending = queue.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].call_id, "call_1");
    assert_eq!(pending[0].listener.listener, "EmailListener");
    assert_eq!(pending[0].context.conversation_id.as_deref(), Some("conv-42"));
    assert_eq!(
        results[0].result.as_ref().unwrap()["job_id"],
        pending[0].job_id.as_str()
    );

    let stats = h.relay.executor().stats();
    assert_eq!(stats.total_calls, 3);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.unknown_tools, 1);

    h.relay.shutdown().await;
}

#[tokio::test]
async fn test_failing_server_is_isolated() {
    let servers = InMemoryServers::default().with_server("docs-mcp", &["search_docs", "fetch_page"]);
    let h = harness(servers, &[("docs", "docs-mcp"), ("down", "missing-mcp")]).await;

    let report = h.relay.registry().refresh(true).await;
    assert_eq!(report.sources_checked, 3);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("down"));

    let catalog = h.relay.registry().get_all_tools().await;
    let mut names = catalog.names();
    names.sort();
    assert_eq!(names, vec!["fetch_page", "search_docs", "send_email"]);

    let stats = h.relay.registry().get_stats().await;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_type.values().sum::<usize>(), stats.total);
    assert_eq!(stats.by_execution_mode.values().sum::<usize>(), stats.total);
    assert_eq!(stats.by_type[&ToolType::ExternalTool], 2);
    assert_eq!(stats.by_execution_mode[&ExecutionMode::Background], 1);
}

#[tokio::test]
async fn test_forced_refresh_sees_new_tool() {
    let servers = InMemoryServers::default().with_server("docs-mcp", &["search_docs"]);
    let h = harness(servers, &[("docs", "docs-mcp")]).await;
    let registry = h.relay.registry();

    let first = registry.get_all_tools().await;
    assert!(!first.contains("summarize"));

    h.servers.add_tool("docs-mcp", "summarize");

    let cached = registry.get_all_tools().await;
    assert!(Arc::ptr_eq(&first, &cached));

    let report = registry.refresh(true).await;
    assert!(report.is_complete());
    let refreshed = registry.get_all_tools().await;
    assert!(refreshed.contains("summarize"));
    assert_eq!(
        refreshed.get("summarize").unwrap().execution_mode(),
        ExecutionMode::Immediate
    );
}

#[tokio::test]
async fn test_local_event_wins_name_collision() {
    let servers = InMemoryServers::default().with_server("mail-mcp", &["send_email", "list_inbox"]);
    let h = harness(servers, &[("mail", "mail-mcp")]).await;

    let report = h.relay.registry().refresh(true).await;
    assert_eq!(report.collisions.len(), 1);
    assert!(report.collisions[0].starts_with("send_email"));

    let tool = h.relay.registry().get("send_email").await.unwrap();
    assert_eq!(tool.tool_type(), ToolType::LocalEvent);
    assert_eq!(tool.source(), "local_events");
}

#[tokio::test]
async fn test_preflight_rejects_unknown_before_any_lane() {
    let servers = InMemoryServers::default().with_server("docs-mcp", &["search_docs"]);
    let h = harness(servers, &[("docs", "docs-mcp")]).await;

    let calls = vec![ToolCallRequest::from_value("bogus_tool", json!({}))];
    let err = h.relay.executor().validate_calls(&calls).await.unwrap_err();
    match err {
        ToolRelayError::UnknownTools(names) => assert_eq!(names, vec!["bogus_tool"]),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.relay.executor().stats().total_calls, 0);
    let queue = FileQueue::new("tool_jobs", &h.queue_path);
    assert!(queue.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_persisted_catalog_survives_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let servers = Arc::new(InMemoryServers::default().with_server("docs-mcp", &["search_docs"]));

    let first = ToolRelay::builder(config_in(&dir, &[("docs", "docs-mcp")]))
        .connector(servers.clone())
        .build()
        .await
        .unwrap();
    first.registry().refresh(false).await;
    first.shutdown().await;
    let connects_after_first = servers.connects.load(Ordering::SeqCst);
    assert_eq!(connects_after_first, 1);

    let second = ToolRelay::builder(config_in(&dir, &[("docs", "docs-mcp")]))
        .connector(servers.clone())
        .build()
        .await
        .unwrap();
    let catalog = second.registry().get_all_tools().await;

    assert!(catalog.contains("search_docs"));
    assert!(catalog.contains("send_email"));
    assert_eq!(servers.connects.load(Ordering::SeqCst), connects_after_first);
}

#[tokio::test]
async fn test_function_definitions_for_model() {
    let servers = InMemoryServers::default().with_server("docs-mcp", &["search_docs"]);
    let h = harness(servers, &[("docs", "docs-mcp")]).await;

    let catalog = h.relay.registry().get_all_tools().await;
    let definitions: Vec<Value> = catalog
        .descriptors()
        .map(|d| d.to_function_definition())
        .collect();

    assert_eq!(definitions.len(), 2);
    for definition in &definitions {
        assert_eq!(definition["type"], "function");
        assert_eq!(definition["function"]["parameters"]["type"], "object");
    }
}
