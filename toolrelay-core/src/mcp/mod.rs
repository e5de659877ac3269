//! Model Context Protocol (MCP) client
//!
//! Connects to external tool servers over newline-delimited JSON-RPC 2.0
//! and exposes them through [`McpServerAdapter`], the concrete
//! [`ExternalServerAdapter`](crate::discovery::ExternalServerAdapter).
//!
//! # Protocol Overview
//!
//! - `initialize` / `notifications/initialized` - Connection setup
//! - `tools/list` - List available tools (cursor-paginated)
//! - `tools/call` - Call a tool
//!
//! # References
//!
//! - [Model Context Protocol](https://modelcontextprotocol.io/specification)

mod adapter;
mod client;
mod protocol;
mod transport;

pub use adapter::{McpServerAdapter, McpServerConfig, ProcessConnector, TransportConnector};
pub use client::McpClient;
pub use protocol::*;
pub use transport::{ChildProcessTransport, MemoryTransport, Transport};
