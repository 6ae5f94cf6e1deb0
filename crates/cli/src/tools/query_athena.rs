use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use athena_mcp_query::{AthenaError, AthenaService, QueryRequest};
use athena_mcp_tool_runtime::{Tool, ToolContext, ToolDefinition, ToolError, ToolResponse};

const NAME: &str = "query_athena";

/// Runs one SQL statement and returns the result as a table.
pub struct QueryAthenaTool {
    service: Arc<AthenaService>,
}

impl QueryAthenaTool {
    pub fn new(service: Arc<AthenaService>) -> Self {
        Self { service }
    }

    async fn run(&self, input: &Value) -> Result<String, AthenaError> {
        let request = QueryRequest::from_args(input, self.service.max_query_length())?;
        self.service.query(&request).await
    }
}

#[async_trait]
impl Tool for QueryAthenaTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Execute SQL queries on AWS Athena for semi-structured data".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "SQL query to execute"
                    },
                    "query": {
                        "type": "string",
                        "description": "Alias of 'sql'"
                    },
                    "database": {
                        "type": "string",
                        "description": "Athena database name (defaults to the configured database)"
                    },
                    "max_rows": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Maximum rows to return, capped by the server limit"
                    }
                },
                "required": ["sql"]
            }),
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResponse, ToolError> {
        Ok(super::respond(NAME, ctx, self.run(&input).await))
    }
}
