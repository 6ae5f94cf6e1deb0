use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use athena_mcp_query::{AthenaError, AthenaService, DescribeRequest};
use athena_mcp_tool_runtime::{Tool, ToolContext, ToolDefinition, ToolError, ToolResponse};

const NAME: &str = "describe_data_structure";

/// Lists a database's tables, or the columns of one table.
pub struct DescribeDataStructureTool {
    service: Arc<AthenaService>,
}

impl DescribeDataStructureTool {
    pub fn new(service: Arc<AthenaService>) -> Self {
        Self { service }
    }

    async fn run(&self, input: &Value) -> Result<String, AthenaError> {
        let request = DescribeRequest::from_args(input)?;
        self.service.describe(&request).await
    }
}

#[async_trait]
impl Tool for DescribeDataStructureTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Get information about available tables and their structure".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "database": {
                        "type": "string",
                        "description": "Database to explore (defaults to the configured database)"
                    },
                    "table": {
                        "type": "string",
                        "description": "Table whose columns and partition keys to describe"
                    }
                }
            }),
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResponse, ToolError> {
        Ok(super::respond(NAME, ctx, self.run(&input).await))
    }
}
