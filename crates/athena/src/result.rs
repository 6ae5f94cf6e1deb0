use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{QueryExecution, QueryState};

/// Column definition returned by an Athena query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthenaColumn {
    /// Column name as declared in the result set.
    pub name: String,
    /// Athena data type (e.g. "varchar", "bigint", "double", "boolean", "timestamp").
    pub data_type: String,
}

impl AthenaColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Execution metadata for a completed Athena query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Athena query execution ID.
    pub query_id: String,
    /// Total bytes scanned during execution.
    pub bytes_scanned: u64,
    /// Engine execution time in milliseconds.
    pub execution_time_ms: u64,
    /// Final execution state.
    pub state: QueryState,
    pub submitted_at: Option<DateTime<Utc>>,
    /// S3 output location where results were written, if available.
    pub output_location: Option<String>,
}

impl From<&QueryExecution> for QueryMetadata {
    fn from(qe: &QueryExecution) -> Self {
        Self {
            query_id: qe.execution_id.clone(),
            bytes_scanned: qe.bytes_scanned,
            execution_time_ms: qe.execution_time_ms,
            state: qe.state,
            submitted_at: qe.submitted_at,
            output_location: qe.output_location.clone(),
        }
    }
}

/// Structured result set from an Athena query execution.
///
/// Rows are stored as `Vec<Option<String>>` where `None` represents SQL NULL.
/// Column ordering in each row matches the `columns` vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthenaQueryResult {
    /// Column definitions in result-set order.
    pub columns: Vec<AthenaColumn>,
    /// Row data, at most the row cap in effect for the query.
    pub rows: Vec<Vec<Option<String>>>,
    /// More rows existed than the cap allowed.
    pub truncated: bool,
    /// Query execution metadata.
    pub metadata: QueryMetadata,
}

/// Athena pricing: $5 per TB scanned.
const DOLLARS_PER_BYTE: f64 = 5.0 / (1024.0 * 1024.0 * 1024.0 * 1024.0);

impl AthenaQueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finds the zero-based index of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value at the given row and column, `None` for out of range or SQL NULL.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&str> {
        let col_idx = self.column_index(col)?;
        self.rows.get(row)?.get(col_idx)?.as_deref()
    }

    /// Values of the first column, skipping NULLs. Used for single-column
    /// listings such as `SHOW TABLES`.
    pub fn first_column_values(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.first().and_then(|v| v.as_deref()))
            .collect()
    }

    /// Estimates the query cost in USD based on Athena's $5/TB pricing model.
    pub fn cost_estimate_usd(&self) -> f64 {
        self.metadata.bytes_scanned as f64 * DOLLARS_PER_BYTE
    }
}

impl fmt::Display for AthenaQueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::format_result_set(self))
    }
}
