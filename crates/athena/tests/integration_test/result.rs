//! Tests for AthenaQueryResult accessors and display.

use athena_mcp_query::*;

fn sample() -> AthenaQueryResult {
    AthenaQueryResult {
        columns: vec![
            AthenaColumn::new("id", "bigint"),
            AthenaColumn::new("name", "varchar"),
            AthenaColumn::new("score", "double"),
        ],
        rows: vec![
            vec![Some("123".to_string()), Some("Alice".to_string()), Some("9.5".to_string())],
            vec![Some("456".to_string()), Some("Bob".to_string()), None],
        ],
        truncated: false,
        metadata: QueryMetadata {
            query_id: "test-123".to_string(),
            bytes_scanned: 1_073_741_824, // 1 GB
            execution_time_ms: 1500,
            state: QueryState::Succeeded,
            submitted_at: None,
            output_location: Some("s3://bucket/results/".to_string()),
        },
    }
}

#[test]
fn test_result_accessors() {
    let result = sample();

    assert_eq!(result.row_count(), 2);
    assert_eq!(result.column_count(), 3);
    assert!(!result.is_empty());
    assert_eq!(result.column_index("name"), Some(1));
    assert_eq!(result.get_value(0, "name"), Some("Alice"));
    assert_eq!(result.get_value(1, "score"), None);
    assert_eq!(result.get_value(99, "id"), None);
    assert_eq!(result.first_column_values(), vec!["123", "456"]);

    // 1 GB at $5 per TB
    assert!((result.cost_estimate_usd() - 5.0 / 1024.0).abs() < 1e-9);
}

#[test]
fn test_result_display_is_markdown_table() {
    let output = sample().to_string();

    assert!(output.starts_with("| id | name | score |\n| --- | --- | --- |\n"));
    assert!(output.contains("| 456 | Bob | NULL |"));
    assert!(output.contains("2 rows"));
    assert!(output.contains("Query test-123 | 1024.000 MB scanned | 1500 ms"));
}
