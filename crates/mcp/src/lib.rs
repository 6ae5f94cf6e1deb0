//! MCP (Model Context Protocol) server for the athena-mcp tools.
//!
//! This crate implements the server side of MCP over JSON-RPC 2.0, exposing
//! a `ToolRegistry` to an MCP host (IDE, agent runtime) over stdio.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **transport**: Splittable transports (stdio, in-memory channels)
//! - **server**: MCP server wrapping a `ToolRegistry`
//! - **error**: Unified error types
//!
//! # Usage
//!
//! ```no_run
//! use athena_mcp_protocol::server::McpServer;
//! use athena_mcp_protocol::transport::StdioTransport;
//! use athena_mcp_tool_runtime::ToolRegistry;
//!
//! # async fn example() {
//! let registry = ToolRegistry::new();
//! let mut server = McpServer::new(registry);
//! server.run(StdioTransport::new()).await.unwrap();
//! # }
//! ```

pub mod types;
pub mod transport;
pub mod server;
pub mod error;

pub use types::*;
pub use transport::{ChannelTransport, McpTransport, MessageReader, MessageWriter, StdioTransport};
pub use server::McpServer;
pub use error::McpError;
