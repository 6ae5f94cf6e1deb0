use clap::Parser;

/// MCP server exposing AWS Athena as tools.
///
/// Speaks newline-delimited JSON-RPC on stdin/stdout; logs go to stderr.
/// Athena settings are read from the environment (and `.env`).
#[derive(Parser, Debug)]
#[command(name = "athena-mcp", version, about = "MCP server for AWS Athena")]
pub struct CliArgs {
    /// Log filter, e.g. "info" or "athena_mcp_query=debug" (falls back to RUST_LOG)
    #[arg(long, env = "ATHENA_MCP_LOG")]
    pub log_level: Option<String>,

    /// Do not list databases at startup to verify AWS access
    #[arg(long)]
    pub skip_connectivity_check: bool,
}
