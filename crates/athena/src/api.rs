//! The seam between query logic and the Athena service.
//!
//! [`AthenaApi`] is a one-call-per-method view of the Athena endpoints this
//! crate uses. [`crate::client::SdkAthenaClient`] implements it over the AWS
//! SDK; tests substitute a scripted fake.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AthenaError;
use crate::result::AthenaColumn;

/// Execution state reported by `GetQueryExecution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed | QueryState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything `StartQueryExecution` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySubmission {
    pub sql: String,
    pub database: String,
    pub workgroup: String,
    pub output_location: String,
}

/// Snapshot of one query execution as last reported by Athena.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExecution {
    pub execution_id: String,
    pub state: QueryState,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Engine-supplied explanation for FAILED / CANCELLED.
    pub state_reason: Option<String>,
    pub bytes_scanned: u64,
    pub execution_time_ms: u64,
    pub output_location: Option<String>,
}

impl QueryExecution {
    /// A bare execution in the given state, with no statistics.
    pub fn new(execution_id: impl Into<String>, state: QueryState) -> Self {
        Self {
            execution_id: execution_id.into(),
            state,
            submitted_at: None,
            state_reason: None,
            bytes_scanned: 0,
            execution_time_ms: 0,
            output_location: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_reason = Some(reason.into());
        self
    }
}

/// One page of `GetQueryResults`, already stripped of the header echo row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub columns: Vec<AthenaColumn>,
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
}

/// A database entry from `ListDatabases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub description: Option<String>,
}

/// A column or partition key from `GetTableMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: String,
    pub comment: Option<String>,
}

/// Table layout from `GetTableMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub table_type: Option<String>,
    pub columns: Vec<SchemaColumn>,
    pub partition_keys: Vec<SchemaColumn>,
}

/// Athena endpoints used by the query runner and the tool handlers.
#[async_trait]
pub trait AthenaApi: Send + Sync {
    /// `StartQueryExecution`; returns the execution id.
    async fn start_query(&self, submission: &QuerySubmission) -> Result<String, AthenaError>;

    /// `GetQueryExecution`.
    async fn query_execution(&self, execution_id: &str) -> Result<QueryExecution, AthenaError>;

    /// `GetQueryResults`. `first_page` tells the implementation to drop the
    /// header echo row when present.
    async fn result_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: i32,
        first_page: bool,
    ) -> Result<ResultPage, AthenaError>;

    /// `StopQueryExecution`.
    async fn stop_query(&self, execution_id: &str) -> Result<(), AthenaError>;

    /// `ListDatabases`, all pages.
    async fn list_databases(&self, catalog: &str) -> Result<Vec<DatabaseInfo>, AthenaError>;

    /// `GetTableMetadata`.
    async fn table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<TableSchema, AthenaError>;
}
