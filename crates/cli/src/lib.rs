//! Tool handlers and command-line surface of the `athena-mcp` server.

pub mod cli;
pub mod tools;
