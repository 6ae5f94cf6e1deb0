//! Text rendering for tool responses.
//!
//! Every function here is pure: the same input always yields byte-identical
//! output, with column and row order taken from the source.

use std::fmt::Write as _;

use crate::api::{DatabaseInfo, SchemaColumn, TableSchema};
use crate::error::AthenaError;
use crate::result::AthenaQueryResult;

/// Rendering of SQL NULL inside tables.
const NULL_CELL: &str = "NULL";

/// Markdown table of a result set, followed by a short summary.
///
/// ```text
/// | id | name |
/// | --- | --- |
/// | 1 | alice |
///
/// 1 row
/// Query 3f2a... | 0.002 MB scanned | 150 ms
/// ```
pub fn format_result_set(result: &AthenaQueryResult) -> String {
    if result.columns.is_empty() {
        return "No results found".to_string();
    }

    let mut out = String::new();

    let header: Vec<String> = result.columns.iter().map(|c| escape_cell(&c.name)).collect();
    table_line(&mut out, &header);
    table_line(&mut out, &vec!["---".to_string(); header.len()]);

    for row in &result.rows {
        let cells: Vec<String> = (0..header.len())
            .map(|i| match row.get(i) {
                Some(Some(value)) => escape_cell(value),
                _ => NULL_CELL.to_string(),
            })
            .collect();
        table_line(&mut out, &cells);
    }

    out.push('\n');
    out.push_str(&row_count_label(result.row_count()));
    if result.truncated {
        let _ = write!(
            out,
            " (truncated at {} rows; add LIMIT or narrow the query)",
            result.row_count()
        );
    }
    out.push('\n');

    let meta = &result.metadata;
    let _ = write!(
        out,
        "Query {} | {:.3} MB scanned | {} ms",
        meta.query_id,
        meta.bytes_scanned as f64 / (1024.0 * 1024.0),
        meta.execution_time_ms,
    );

    out
}

/// Bullet list of databases with optional descriptions.
pub fn format_database_list(databases: &[DatabaseInfo]) -> String {
    if databases.is_empty() {
        return "No databases found.".to_string();
    }

    let mut out = format!("Available databases ({} total):\n\n", databases.len());
    for db in databases {
        match &db.description {
            Some(description) => {
                let _ = writeln!(out, "- **{}** - {}", db.name, single_line(description));
            }
            None => {
                let _ = writeln!(out, "- **{}**", db.name);
            }
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// Listing of the tables returned by `SHOW TABLES IN <database>`.
pub fn format_table_list(database: &str, result: &AthenaQueryResult) -> String {
    let tables = result.first_column_values();
    if tables.is_empty() {
        return format!("No tables found in database '{database}'.");
    }

    let mut out = format!(
        "Tables available in database '{database}' ({}{}):\n\n",
        tables.len(),
        if result.truncated { "+, truncated" } else { " total" }
    );
    for table in tables {
        let _ = writeln!(out, "- {table}");
    }
    out.truncate(out.trim_end().len());
    out
}

/// Column and partition-key layout of one table.
pub fn format_table_schema(database: &str, schema: &TableSchema) -> String {
    let mut out = format!("Table '{database}.{}'", schema.name);
    if let Some(kind) = &schema.table_type {
        let _ = write!(out, " ({kind})");
    }
    out.push_str("\n\n");

    schema_table(&mut out, &schema.columns);

    if !schema.partition_keys.is_empty() {
        out.push_str("\nPartition keys:\n\n");
        schema_table(&mut out, &schema.partition_keys);
    }

    out.truncate(out.trim_end().len());
    out
}

/// Single-line summary naming the error kind and detail.
pub fn format_error(err: &AthenaError) -> String {
    format!("Error [{}]: {}", err.kind(), single_line(&err.to_string()))
}

// ── Helpers ──────────────────────────────────────────────────────

fn schema_table(out: &mut String, columns: &[SchemaColumn]) {
    if columns.is_empty() {
        out.push_str("(no columns)\n");
        return;
    }
    table_line(out, &["column".to_string(), "type".to_string(), "comment".to_string()]);
    table_line(out, &vec!["---".to_string(); 3]);
    for col in columns {
        table_line(
            out,
            &[
                escape_cell(&col.name),
                escape_cell(&col.data_type),
                col.comment.as_deref().map(escape_cell).unwrap_or_default(),
            ],
        );
    }
}

fn table_line(out: &mut String, cells: &[String]) {
    out.push_str("| ");
    out.push_str(&cells.join(" | "));
    out.push_str(" |\n");
}

/// Keep a value inside its table cell.
fn escape_cell(value: &str) -> String {
    single_line(value).replace('|', "\\|")
}

fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_count_label(n: usize) -> String {
    if n == 1 {
        "1 row".to_string()
    } else {
        format!("{n} rows")
    }
}
