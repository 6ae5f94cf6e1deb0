//! End-to-end tests: MCP frames in, Athena fake behind the tools.

use std::sync::Arc;

use serde_json::{json, Value};

use athena_mcp_cli::tools;
use athena_mcp_protocol::transport::{ChannelReader, ChannelWriter};
use athena_mcp_protocol::*;
use athena_mcp_query::testing::{Call, ScriptedAthena};
use athena_mcp_query::{AthenaConfig, AthenaService, QueryState};
use athena_mcp_tool_runtime::ToolRegistry;

fn configured() -> AthenaConfig {
    AthenaConfig {
        output_location: Some("s3://results-bucket/athena/".into()),
        max_rows: 3,
        timeout_seconds: 10,
        ..AthenaConfig::default()
    }
}

struct Harness {
    rx: ChannelReader,
    tx: ChannelWriter,
    next_id: i64,
}

impl Harness {
    fn start(config: &AthenaConfig, fake: &Arc<ScriptedAthena>) -> Self {
        let service = Arc::new(AthenaService::new(config, fake.clone()));
        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry, service).unwrap();

        let (client, server_side) = ChannelTransport::pair();
        tokio::spawn(async move { McpServer::new(registry).run(server_side).await });

        let (rx, tx) = client.split();
        Self { rx, tx, next_id: 0 }
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> JsonRpcResponse {
        self.next_id += 1;
        let req = JsonRpcRequest::new(RpcId::Number(self.next_id), method, params);
        self.tx.send(&serde_json::to_string(&req).unwrap()).await.unwrap();
        let line = self.rx.receive().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn call(&mut self, tool: &str, arguments: Value) -> (String, bool) {
        let resp = self
            .request("tools/call", Some(json!({"name": tool, "arguments": arguments})))
            .await;
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        match result.content.into_iter().next() {
            Some(ToolContent::Text { text }) => (text, result.is_error),
            None => panic!("empty tool result"),
        }
    }
}

#[tokio::test]
async fn test_tools_list_advertises_three_tools_in_order() {
    let fake = Arc::new(ScriptedAthena::new());
    let mut h = Harness::start(&configured(), &fake);

    let resp = h.request("tools/list", None).await;
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["list_databases", "query_athena", "describe_data_structure"]);
    assert_eq!(tools[1]["inputSchema"]["required"], json!(["sql"]));
}

#[tokio::test(start_paused = true)]
async fn test_query_returns_table_capped_at_max_rows() {
    let fake = Arc::new(
        ScriptedAthena::new()
            .with_states(&[QueryState::Running, QueryState::Running, QueryState::Succeeded])
            .with_result(
                &["id", "name"],
                vec![
                    vec![Some("1"), Some("a")],
                    vec![Some("2"), None],
                    vec![Some("3"), Some("c")],
                    vec![Some("4"), Some("d")],
                ],
            ),
    );
    let mut h = Harness::start(&configured(), &fake);

    let (text, is_error) = h.call("query_athena", json!({"sql": "SELECT id, name FROM t"})).await;

    assert!(!is_error, "{text}");
    assert!(text.starts_with("Query executed successfully:"));
    assert!(text.contains("| id | name |"));
    assert!(text.contains("| 2 | NULL |"));
    assert!(!text.contains("| 4 | d |"));
    assert!(text.contains("3 rows (truncated"));
    assert_eq!(fake.count(Call::Status), 3);
}

#[tokio::test]
async fn test_invalid_arguments_make_no_calls() {
    let fake = Arc::new(ScriptedAthena::new());
    let mut h = Harness::start(&configured(), &fake);

    for args in [
        json!({"sql": ""}),
        json!({"sql": "SELECT 1", "database": "bad name"}),
        json!({}),
    ] {
        let (text, is_error) = h.call("query_athena", args).await;
        assert!(is_error);
        assert!(text.starts_with("Error [ValidationError]:"), "{text}");
    }

    let (text, is_error) = h.call("describe_data_structure", json!({"table": "x;y"})).await;
    assert!(is_error);
    assert!(text.starts_with("Error [ValidationError]:"));

    assert!(fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_query_reports_engine_reason() {
    let fake = Arc::new(ScriptedAthena::new().failing_with(
        QueryState::Failed,
        "SYNTAX_ERROR: line 1:8: Column 'nope' cannot be resolved",
    ));
    let mut h = Harness::start(&configured(), &fake);

    let (text, is_error) = h.call("query_athena", json!({"sql": "SELECT nope FROM t"})).await;

    assert!(is_error);
    assert!(text.starts_with("Error [ExecutionError]:"));
    assert!(text.contains("SYNTAX_ERROR"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_names_execution_id() {
    let fake = Arc::new(ScriptedAthena::new().with_states(&[QueryState::Running]));
    let mut h = Harness::start(&configured(), &fake);

    let (text, is_error) = h.call("query_athena", json!({"sql": "SELECT 1"})).await;

    assert!(is_error);
    assert!(text.starts_with("Error [TimeoutError]:"));
    assert!(text.contains(ScriptedAthena::EXECUTION_ID));
    assert_eq!(fake.count(Call::Stop), 0);
}

#[tokio::test]
async fn test_missing_output_location_fails_every_tool() {
    let fake = Arc::new(ScriptedAthena::new().with_databases(&[("analytics", None)]));
    let mut h = Harness::start(&AthenaConfig::default(), &fake);

    for (tool, args) in [
        ("list_databases", json!({})),
        ("query_athena", json!({"sql": "SELECT 1"})),
        ("describe_data_structure", json!({"database": "analytics"})),
    ] {
        let (text, is_error) = h.call(tool, args).await;
        assert!(is_error, "{tool}");
        assert!(text.starts_with("Error [ConfigurationError]:"), "{tool}: {text}");
        assert!(text.contains("AWS_S3_OUTPUT_LOCATION"));
    }

    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_list_databases() {
    let fake = Arc::new(
        ScriptedAthena::new().with_databases(&[("analytics", Some("Curated marts")), ("raw", None)]),
    );
    let mut h = Harness::start(&configured(), &fake);

    let (text, is_error) = h.call("list_databases", json!({})).await;

    assert!(!is_error);
    assert_eq!(
        text,
        "Available databases (2 total):\n\n- **analytics** - Curated marts\n- **raw**"
    );
}

#[tokio::test(start_paused = true)]
async fn test_describe_lists_tables_of_default_database() {
    let fake = Arc::new(
        ScriptedAthena::new().with_result(&["tab_name"], vec![vec![Some("events")], vec![Some("users")]]),
    );
    let mut h = Harness::start(&configured(), &fake);

    let (text, is_error) = h.call("describe_data_structure", json!({})).await;

    assert!(!is_error, "{text}");
    assert_eq!(
        text,
        "Tables available in database 'default' (2 total):\n\n- events\n- users"
    );
    assert_eq!(fake.submissions()[0].sql, "SHOW TABLES IN default");
}

#[tokio::test]
async fn test_ping_answers() {
    let fake = Arc::new(ScriptedAthena::new());
    let mut h = Harness::start(&configured(), &fake);

    let resp = h.request("ping", None).await;
    assert_eq!(resp.result, Some(json!({})));
}
