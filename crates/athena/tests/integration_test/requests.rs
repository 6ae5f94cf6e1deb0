//! Tests for tool-argument parsing and error rendering.

use athena_mcp_query::format::format_error;
use athena_mcp_query::*;
use serde_json::json;

#[test]
fn test_query_alias_and_defaults() {
    let req = QueryRequest::from_args(&json!({"query": "SELECT 1"}), 10_000).unwrap();
    assert_eq!(req.sql, "SELECT 1");
    assert_eq!(req.database, None);
    assert_eq!(req.max_rows, None);
}

#[test]
fn test_query_rejections_render_as_validation_errors() {
    let cases = [
        json!({}),
        json!({"sql": "   "}),
        json!({"sql": 42}),
        json!({"sql": "SELECT 1", "database": "bad-name"}),
        json!({"sql": "SELECT 1", "max_rows": -5}),
        json!(["SELECT 1"]),
    ];

    for args in cases {
        let err: AthenaError = QueryRequest::from_args(&args, 10_000).unwrap_err().into();
        let text = format_error(&err);
        assert!(
            text.starts_with("Error [ValidationError]: "),
            "unexpected rendering for {args}: {text}"
        );
    }
}

#[test]
fn test_query_length_limit_counts_trimmed_text() {
    let sql = format!("  {}  ", "x".repeat(50));
    assert!(QueryRequest::from_args(&json!({ "sql": sql }), 50).is_ok());

    let err = QueryRequest::from_args(&json!({ "sql": "x".repeat(51) }), 50).unwrap_err();
    assert_eq!(err.field, "sql");
}

#[test]
fn test_describe_request() {
    let req = DescribeRequest::from_args(&json!({"database": "logs", "table": "events"})).unwrap();
    assert_eq!(req.database.as_deref(), Some("logs"));
    assert_eq!(req.table.as_deref(), Some("events"));

    let req = DescribeRequest::from_args(&json!(null)).unwrap();
    assert_eq!(req, DescribeRequest { database: None, table: None });

    assert!(DescribeRequest::from_args(&json!({"table": "events; DROP"})).is_err());
}
