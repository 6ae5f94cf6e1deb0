//! The three Athena tools.
//!
//! Every handler catches its own failures: the outcome is always a
//! `ToolResponse`, with `is_error` set and a single-line
//! `Error [<Kind>]: <detail>` message when something went wrong.

mod describe_data_structure;
mod list_databases;
mod query_athena;

pub use describe_data_structure::DescribeDataStructureTool;
pub use list_databases::ListDatabasesTool;
pub use query_athena::QueryAthenaTool;

use std::sync::Arc;

use athena_mcp_query::format::format_error;
use athena_mcp_query::{AthenaError, AthenaService};
use athena_mcp_tool_runtime::{RegistryError, ToolContext, ToolRegistry, ToolResponse};

/// Register all tools, in the order `tools/list` reports them.
pub fn register_all(
    registry: &mut ToolRegistry,
    service: Arc<AthenaService>,
) -> Result<(), RegistryError> {
    registry.register(ListDatabasesTool::new(service.clone()))?;
    registry.register(QueryAthenaTool::new(service.clone()))?;
    registry.register(DescribeDataStructureTool::new(service))?;
    Ok(())
}

/// Turn an operation outcome into a tool response, logging failures.
fn respond(tool: &str, ctx: &ToolContext, outcome: Result<String, AthenaError>) -> ToolResponse {
    match outcome {
        Ok(text) => ToolResponse::text(text),
        Err(err) => {
            let query_id = err.query_id().unwrap_or("");
            match &err {
                AthenaError::Validation(_) => tracing::warn!(
                    tool,
                    call_id = %ctx.call_id,
                    kind = err.kind(),
                    error = %err,
                    "Rejected tool arguments"
                ),
                _ => tracing::error!(
                    tool,
                    call_id = %ctx.call_id,
                    kind = err.kind(),
                    query_id,
                    error = %err,
                    "Tool call failed"
                ),
            }
            ToolResponse::error(format_error(&err))
        }
    }
}
