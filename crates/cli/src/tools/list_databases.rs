use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use athena_mcp_query::{validate, AthenaError, AthenaService};
use athena_mcp_tool_runtime::{Tool, ToolContext, ToolDefinition, ToolError, ToolResponse};

const NAME: &str = "list_databases";

/// Lists the databases in the configured data catalog.
pub struct ListDatabasesTool {
    service: Arc<AthenaService>,
}

impl ListDatabasesTool {
    pub fn new(service: Arc<AthenaService>) -> Self {
        Self { service }
    }

    async fn run(&self, input: &Value) -> Result<String, AthenaError> {
        validate::no_args(input)?;
        self.service.list_databases().await
    }
}

#[async_trait]
impl Tool for ListDatabasesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "List all available databases in AWS Athena".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResponse, ToolError> {
        Ok(super::respond(NAME, ctx, self.run(&input).await))
    }
}
