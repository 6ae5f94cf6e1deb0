//! AWS SDK implementation of [`AthenaApi`] and the factory that builds it.
//!
//! [`ClientFactory::create`] turns an [`AthenaConfig`] into a configured SDK
//! client once per process. [`SdkAthenaClient`] maps each SDK response into
//! the crate's own types and classifies SDK failures as transient or not.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_athena::config::Credentials;
use aws_sdk_athena::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{
    AthenaApi, DatabaseInfo, QueryExecution, QueryState, QuerySubmission, ResultPage,
    SchemaColumn, TableSchema,
};
use crate::config::{AthenaConfig, CredentialSource};
use crate::error::AthenaError;
use crate::result::AthenaColumn;

/// Provider name attached to credentials read from the environment.
const ENV_PROVIDER_NAME: &str = "athena-mcp-env";

/// Service error codes worth retrying.
const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "TooManyRequestsException",
    "InternalServerException",
    "ServiceUnavailable",
    "RequestTimeout",
    "RequestLimitExceeded",
    "SlowDown",
];

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds the process-wide Athena client.
pub struct ClientFactory;

impl ClientFactory {
    /// Validate `config` and construct an SDK-backed client.
    ///
    /// Credentials come from, in order: explicit keys, a named profile, or
    /// the SDK's default provider chain. Fails with
    /// [`AthenaError::Configuration`] before touching the SDK when the output
    /// location is missing or malformed.
    pub async fn create(config: &AthenaConfig) -> Result<SdkAthenaClient, AthenaError> {
        config.validate()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        loader = match &config.credentials {
            CredentialSource::Explicit {
                access_key_id,
                secret_access_key,
                session_token,
            } => loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                session_token.clone(),
                None,
                ENV_PROVIDER_NAME,
            )),
            CredentialSource::Profile(name) => loader.profile_name(name),
            CredentialSource::Default => loader,
        };

        let sdk_config = loader.load().await;

        info!(
            region = %config.region,
            workgroup = %config.workgroup,
            credentials = config.credentials.label(),
            "Athena client initialised"
        );

        Ok(SdkAthenaClient::new(aws_sdk_athena::Client::new(&sdk_config)))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`AthenaApi`] over the AWS SDK Athena client.
#[derive(Debug, Clone)]
pub struct SdkAthenaClient {
    inner: aws_sdk_athena::Client,
}

impl SdkAthenaClient {
    pub fn new(inner: aws_sdk_athena::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AthenaApi for SdkAthenaClient {
    async fn start_query(&self, submission: &QuerySubmission) -> Result<String, AthenaError> {
        let resp = self
            .inner
            .start_query_execution()
            .query_string(&submission.sql)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&submission.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&submission.output_location)
                    .build(),
            )
            .work_group(&submission.workgroup)
            .send()
            .await
            .map_err(|e| sdk_error("StartQueryExecution", e))?;

        resp.query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| AthenaError::ParseError("No query execution ID returned".into()))
    }

    async fn query_execution(&self, execution_id: &str) -> Result<QueryExecution, AthenaError> {
        let resp = self
            .inner
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| sdk_error("GetQueryExecution", e))?;

        let qe = resp
            .query_execution()
            .ok_or_else(|| AthenaError::ParseError("No query execution in response".into()))?;

        let status = qe.status();
        let stats = qe.statistics();

        Ok(QueryExecution {
            execution_id: execution_id.to_string(),
            state: status
                .and_then(|s| s.state())
                .map(map_state)
                .unwrap_or(QueryState::Queued),
            submitted_at: status
                .and_then(|s| s.submission_date_time())
                .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
            state_reason: status
                .and_then(|s| s.state_change_reason())
                .map(str::to_string),
            bytes_scanned: stats
                .and_then(|s| s.data_scanned_in_bytes())
                .unwrap_or(0)
                .max(0) as u64,
            execution_time_ms: stats
                .and_then(|s| s.engine_execution_time_in_millis())
                .unwrap_or(0)
                .max(0) as u64,
            output_location: qe
                .result_configuration()
                .and_then(|rc| rc.output_location())
                .map(str::to_string),
        })
    }

    async fn result_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: i32,
        first_page: bool,
    ) -> Result<ResultPage, AthenaError> {
        let output = self
            .inner
            .get_query_results()
            .query_execution_id(execution_id)
            .set_next_token(next_token.map(str::to_string))
            .max_results(max_results)
            .send()
            .await
            .map_err(|e| sdk_error("GetQueryResults", e))?;

        let result_set = output
            .result_set()
            .ok_or_else(|| AthenaError::ParseError("No ResultSet in response".into()))?;

        let columns: Vec<AthenaColumn> = result_set
            .result_set_metadata()
            .map(|meta| {
                meta.column_info()
                    .iter()
                    .map(|ci| AthenaColumn::new(ci.name(), ci.r#type()))
                    .collect()
            })
            .unwrap_or_default();

        let mut rows: Vec<Vec<Option<String>>> = result_set
            .rows()
            .iter()
            .map(|row| {
                row.data()
                    .iter()
                    .map(|datum| datum.var_char_value().map(str::to_string))
                    .collect()
            })
            .collect();

        if first_page && is_header_echo(&columns, rows.first()) {
            rows.remove(0);
        }

        debug!(
            execution_id,
            columns = columns.len(),
            rows = rows.len(),
            has_more = output.next_token().is_some(),
            "Fetched result page"
        );

        Ok(ResultPage {
            columns,
            rows,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn stop_query(&self, execution_id: &str) -> Result<(), AthenaError> {
        self.inner
            .stop_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| sdk_error("StopQueryExecution", e))?;
        Ok(())
    }

    async fn list_databases(&self, catalog: &str) -> Result<Vec<DatabaseInfo>, AthenaError> {
        let mut databases = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let resp = self
                .inner
                .list_databases()
                .catalog_name(catalog)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| sdk_error("ListDatabases", e))?;

            databases.extend(resp.database_list().iter().map(|db| DatabaseInfo {
                name: db.name().to_string(),
                description: db
                    .description()
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            }));

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(databases)
    }

    async fn table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<TableSchema, AthenaError> {
        let resp = self
            .inner
            .get_table_metadata()
            .catalog_name(catalog)
            .database_name(database)
            .table_name(table)
            .send()
            .await
            .map_err(|e| sdk_error("GetTableMetadata", e))?;

        let tm = resp
            .table_metadata()
            .ok_or_else(|| AthenaError::ParseError("No TableMetadata in response".into()))?;

        let to_schema = |cols: &[aws_sdk_athena::types::Column]| -> Vec<SchemaColumn> {
            cols.iter()
                .map(|c| SchemaColumn {
                    name: c.name().to_string(),
                    data_type: c.r#type().unwrap_or("unknown").to_string(),
                    comment: c.comment().filter(|s| !s.is_empty()).map(str::to_string),
                })
                .collect()
        };

        Ok(TableSchema {
            name: tm.name().to_string(),
            table_type: tm.table_type().map(str::to_string),
            columns: to_schema(tm.columns()),
            partition_keys: to_schema(tm.partition_keys()),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn map_state(state: &QueryExecutionState) -> QueryState {
    match state {
        QueryExecutionState::Queued => QueryState::Queued,
        QueryExecutionState::Running => QueryState::Running,
        QueryExecutionState::Succeeded => QueryState::Succeeded,
        QueryExecutionState::Failed => QueryState::Failed,
        QueryExecutionState::Cancelled => QueryState::Cancelled,
        // Unknown future variant: keep polling.
        _ => QueryState::Running,
    }
}

/// Athena repeats the column labels as the first row of the first page for
/// SELECT-style statements. DDL output (SHOW TABLES, ...) has no such row.
fn is_header_echo(columns: &[AthenaColumn], first_row: Option<&Vec<Option<String>>>) -> bool {
    match first_row {
        Some(row) if !columns.is_empty() && row.len() == columns.len() => row
            .iter()
            .zip(columns)
            .all(|(cell, col)| cell.as_deref() == Some(col.name.as_str())),
        _ => false,
    }
}

pub(crate) fn is_transient_code(code: &str) -> bool {
    TRANSIENT_CODES.contains(&code)
}

fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> AthenaError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    ) {
        return AthenaError::Transient(format!("{operation}: {}", DisplayErrorContext(&err)));
    }

    let code = err.code().unwrap_or("Unknown").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    if is_transient_code(&code) {
        AthenaError::Transient(format!("{operation}: {code}: {message}"))
    } else {
        AthenaError::AwsSdk { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<AthenaColumn> {
        names.iter().map(|n| AthenaColumn::new(*n, "varchar")).collect()
    }

    fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn header_echo_detected_only_on_exact_match() {
        let columns = cols(&["id", "name"]);
        assert!(is_header_echo(&columns, Some(&row(&[Some("id"), Some("name")]))));
        assert!(!is_header_echo(&columns, Some(&row(&[Some("1"), Some("alice")]))));
        assert!(!is_header_echo(&columns, Some(&row(&[Some("id"), None]))));
        assert!(!is_header_echo(&columns, None));
        assert!(!is_header_echo(&[], Some(&row(&[]))));
    }

    #[test]
    fn state_mapping() {
        assert_eq!(map_state(&QueryExecutionState::Queued), QueryState::Queued);
        assert_eq!(map_state(&QueryExecutionState::Failed), QueryState::Failed);
        assert_eq!(map_state(&QueryExecutionState::Cancelled), QueryState::Cancelled);
    }

    #[test]
    fn throttling_codes_are_transient() {
        assert!(is_transient_code("ThrottlingException"));
        assert!(is_transient_code("TooManyRequestsException"));
        assert!(!is_transient_code("InvalidRequestException"));
        assert!(!is_transient_code("MetadataException"));
    }

    #[tokio::test]
    async fn factory_rejects_missing_output_location() {
        let config = AthenaConfig::default();
        let err = ClientFactory::create(&config).await.err().unwrap();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
