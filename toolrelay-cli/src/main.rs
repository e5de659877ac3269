//! Toolrelay CLI - Inspect the tool catalog and route test calls

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use toolrelay_core::prelude::*;

#[derive(Parser)]
#[command(name = "toolrelay")]
#[command(about = "Unified tool registry and execution router", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to toolrelay.toml)
    #[arg(short, long, global = true, env = "TOOLRELAY_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run discovery and print the report
    Discover {
        /// Bypass cached discovery results
        #[arg(short, long)]
        force: bool,

        /// Refresh a single source
        #[arg(short, long)]
        source: Option<String>,
    },
    /// List catalog tools
    List {
        /// Only tools of this type (external_tool, local_event)
        #[arg(short = 't', long = "type")]
        tool_type: Option<ToolType>,
    },
    /// Search tools by name or description
    Search {
        query: String,
    },
    /// Catalog counts by type and execution mode
    Stats,
    /// Check that every named tool exists
    Validate {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Execute one tool call through the router
    Call {
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Conversation id carried in the execution context
        #[arg(long)]
        conversation_id: Option<String>,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("toolrelay {}", env!("CARGO_PKG_VERSION"));
        println!("toolrelay-core {}", toolrelay_core::VERSION);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => ToolRelayConfig::from_file(path)?,
        None => ToolRelayConfig::load()?,
    };
    let relay = ToolRelay::from_config(config)
        .await
        .context("failed to initialize tool relay")?;

    let outcome = run(&relay, cli.command, cli.json).await;
    relay.shutdown().await;
    outcome
}

async fn run(relay: &ToolRelay, command: Commands, json: bool) -> Result<()> {
    let registry = relay.registry();

    match command {
        Commands::Discover { force, source } => {
            let report = match source {
                Some(source) => registry.refresh_source(&source, force).await,
                None => registry.refresh(force).await,
            };
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "checked {} sources: {} ok, {} failed, {} tools",
                    report.sources_checked,
                    report.sources_succeeded,
                    report.sources_failed,
                    report.tools_found
                );
                for error in &report.errors {
                    println!("  error: {}", error);
                }
                for collision in &report.collisions {
                    println!("  collision: {}", collision);
                }
            }
        }
        Commands::List { tool_type } => {
            let tools: Vec<ToolDescriptor> = match tool_type {
                Some(tool_type) => registry.get_tools_by_type(tool_type).await,
                None => registry.get_all_tools().await.descriptors().cloned().collect(),
            };
            print_tools(&tools, json)?;
        }
        Commands::Search { query } => {
            let tools = registry.search_tools(&query).await;
            print_tools(&tools, json)?;
        }
        Commands::Stats => {
            let stats = registry.get_stats().await;
            if json {
                print_json(&stats)?;
            } else {
                println!("total: {}", stats.total);
                for (tool_type, count) in &stats.by_type {
                    println!("  {:<14} {}", tool_type.as_str(), count);
                }
                for (mode, count) in &stats.by_execution_mode {
                    println!("  {:<14} {}", mode.as_str(), count);
                }
            }
        }
        Commands::Validate { names } => match registry.validate_requested(names.as_slice()).await {
            Ok(descriptors) => {
                if json {
                    let summaries: Vec<_> = descriptors.iter().map(|d| d.summary()).collect();
                    print_json(&summaries)?;
                } else {
                    println!("all {} tools available", descriptors.len());
                }
            }
            Err(ToolRelayError::UnknownTools(missing)) => {
                if json {
                    print_json(&serde_json::json!({ "unknown_tools": missing }))?;
                }
                bail!("unknown tools: {}", missing.join(", "));
            }
            Err(e) => return Err(e.into()),
        },
        Commands::Call {
            name,
            args,
            conversation_id,
        } => {
            let arguments: Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            if !arguments.is_object() {
                bail!("--args must be a JSON object");
            }

            let mut context = ExecutionContext::new();
            if let Some(conversation_id) = conversation_id {
                context = context.with_conversation_id(conversation_id);
            }

            let results = relay
                .executor()
                .process_tool_calls(vec![ToolCallRequest::from_value(name, arguments)], &context)
                .await?;

            for result in &results {
                if json {
                    print_json(result)?;
                } else {
                    println!("{} {} [{}]", result.call_id, result.name, result.status);
                    if let Some(value) = &result.result {
                        println!("{}", serde_json::to_string_pretty(value)?);
                    }
                    if let Some(error) = &result.error {
                        println!("error: {}", error);
                    }
                }
            }

            if results.iter().any(|r| r.is_error()) {
                bail!("tool call failed");
            }
        }
        Commands::Version => {}
    }

    Ok(())
}

fn print_tools(tools: &[ToolDescriptor], json: bool) -> Result<()> {
    if json {
        let summaries: Vec<_> = tools.iter().map(|t| t.summary()).collect();
        return print_json(&summaries);
    }

    if tools.is_empty() {
        println!("no tools");
        return Ok(());
    }
    for tool in tools {
        println!(
            "{:<32} {:<10} {:<16} {}",
            tool.name,
            tool.execution_mode().as_str(),
            tool.source(),
            tool.description
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
