//! Integration tests for athena-mcp-query.
//!
//! These exercise the public API without AWS credentials or network access.

mod config;
mod requests;
mod result;
