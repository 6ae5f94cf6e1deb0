use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use athena_mcp_cli::cli::CliArgs;
use athena_mcp_cli::tools;
use athena_mcp_protocol::{McpServer, StdioTransport};
use athena_mcp_query::{AthenaConfig, AthenaService};
use athena_mcp_tool_runtime::ToolRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so both clap and the Athena config see its values.
    let dotenv = dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Stdout carries MCP frames; logs go to stderr.
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();

    if let Some(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    let config = AthenaConfig::from_env();
    info!(
        region = %config.region,
        workgroup = %config.workgroup,
        database = %config.database,
        credentials = config.credentials.label(),
        timeout_seconds = config.timeout_seconds,
        max_rows = config.max_rows,
        "Athena configuration loaded"
    );

    let service = Arc::new(AthenaService::connect(&config).await);

    match service.ensure_ready() {
        Err(e) => warn!(error = %e, "Tool calls will fail until configuration is fixed"),
        Ok(()) if args.skip_connectivity_check => info!("Skipping connectivity check"),
        Ok(()) => {
            if let Err(e) = service.check_connectivity().await {
                warn!(kind = e.kind(), error = %e, "Connectivity check failed, serving anyway");
            }
        }
    }

    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry, service).context("failed to register tools")?;

    let mut server = McpServer::new(registry).with_version(env!("CARGO_PKG_VERSION"));
    server
        .run(StdioTransport::new())
        .await
        .context("MCP server failed")?;

    Ok(())
}
