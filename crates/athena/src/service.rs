//! Operations behind the three MCP tools.
//!
//! [`AthenaService`] owns the shared client handle and the query runner. It is
//! built once at startup; if configuration is unusable it is built anyway in
//! an unavailable state so every call can report a `ConfigurationError`
//! without touching the network.

use std::sync::Arc;

use tracing::{error, info};

use crate::api::AthenaApi;
use crate::client::ClientFactory;
use crate::config::AthenaConfig;
use crate::error::AthenaError;
use crate::format;
use crate::lifecycle::{QueryRunner, RunnerSettings};
use crate::validate::{DescribeRequest, QueryRequest};

/// How many database names the startup connectivity check logs.
const CONNECTIVITY_SAMPLE: usize = 5;

struct Backend {
    api: Arc<dyn AthenaApi>,
    runner: QueryRunner,
}

pub struct AthenaService {
    catalog: String,
    default_database: String,
    max_query_length: usize,
    backend: Result<Backend, String>,
}

impl AthenaService {
    /// Wire a service around an existing client.
    pub fn new(config: &AthenaConfig, api: Arc<dyn AthenaApi>) -> Self {
        let backend = RunnerSettings::from_config(config)
            .map(|settings| Backend {
                runner: QueryRunner::new(api.clone(), settings),
                api,
            })
            .map_err(|e| e.to_string());
        Self::with_backend(config, backend)
    }

    /// A service that fails every call with `ConfigurationError`.
    pub fn unavailable(config: &AthenaConfig, reason: &AthenaError) -> Self {
        Self::with_backend(config, Err(reason.to_string()))
    }

    /// Build the SDK client from `config`, degrading to an unavailable
    /// service when that fails.
    pub async fn connect(config: &AthenaConfig) -> Self {
        match ClientFactory::create(config).await {
            Ok(client) => Self::new(config, Arc::new(client)),
            Err(e) => {
                error!(error = %e, "Athena service unavailable");
                Self::unavailable(config, &e)
            }
        }
    }

    fn with_backend(config: &AthenaConfig, backend: Result<Backend, String>) -> Self {
        Self {
            catalog: config.catalog.clone(),
            default_database: config.database.clone(),
            max_query_length: config.max_query_length,
            backend,
        }
    }

    fn backend(&self) -> Result<&Backend, AthenaError> {
        self.backend
            .as_ref()
            .map_err(|reason| AthenaError::Configuration(reason.clone()))
    }

    /// Fail fast when the service cannot reach Athena.
    pub fn ensure_ready(&self) -> Result<(), AthenaError> {
        self.backend().map(|_| ())
    }

    pub fn max_query_length(&self) -> usize {
        self.max_query_length
    }

    /// `list_databases`: metadata API, no query execution.
    pub async fn list_databases(&self) -> Result<String, AthenaError> {
        let backend = self.backend()?;
        info!(catalog = %self.catalog, "Listing databases");

        let databases = backend.api.list_databases(&self.catalog).await?;
        info!(count = databases.len(), "Listed databases");

        Ok(format::format_database_list(&databases))
    }

    /// `query_athena`: run the statement and render the result table.
    pub async fn query(&self, request: &QueryRequest) -> Result<String, AthenaError> {
        let backend = self.backend()?;
        let result = backend.runner.run(request).await?;

        info!(
            query_id = %result.metadata.query_id,
            rows = result.row_count(),
            truncated = result.truncated,
            cost_usd = result.cost_estimate_usd(),
            "Query executed successfully"
        );

        Ok(format!(
            "Query executed successfully:\n\n{}",
            format::format_result_set(&result)
        ))
    }

    /// `describe_data_structure`: table listing for a database, or the
    /// column layout of one table.
    pub async fn describe(&self, request: &DescribeRequest) -> Result<String, AthenaError> {
        let backend = self.backend()?;
        let database = request.database.as_deref().unwrap_or(&self.default_database);

        match &request.table {
            Some(table) => {
                info!(database, table = %table, "Describing table");
                let schema = backend
                    .api
                    .table_metadata(&self.catalog, database, table)
                    .await?;
                Ok(format::format_table_schema(database, &schema))
            }
            None => {
                info!(database, "Listing tables");
                let show = QueryRequest::internal(format!("SHOW TABLES IN {database}"), database);
                let result = backend.runner.run(&show).await?;
                Ok(format::format_table_list(database, &result))
            }
        }
    }

    /// Startup probe: list databases and log a sample of their names.
    pub async fn check_connectivity(&self) -> Result<usize, AthenaError> {
        let backend = self.backend()?;
        let databases = backend.api.list_databases(&self.catalog).await?;

        let sample: Vec<&str> = databases
            .iter()
            .take(CONNECTIVITY_SAMPLE)
            .map(|db| db.name.as_str())
            .collect();
        info!(
            count = databases.len(),
            first = %sample.join(", "),
            "Connected to AWS Athena"
        );

        Ok(databases.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{QueryState, SchemaColumn, TableSchema};
    use crate::testing::{Call, ScriptedAthena};

    fn config() -> AthenaConfig {
        AthenaConfig {
            output_location: Some("s3://results-bucket/athena/".into()),
            ..AthenaConfig::default()
        }
    }

    fn service(fake: &Arc<ScriptedAthena>) -> AthenaService {
        AthenaService::new(&config(), fake.clone())
    }

    #[tokio::test]
    async fn missing_output_location_fails_every_call_without_network() {
        let fake = Arc::new(ScriptedAthena::new());
        let svc = AthenaService::new(&AthenaConfig::default(), fake.clone());

        let errors = vec![
            svc.list_databases().await.unwrap_err(),
            svc.query(&QueryRequest::internal("SELECT 1", "default"))
                .await
                .unwrap_err(),
            svc.describe(&DescribeRequest {
                database: None,
                table: None,
            })
            .await
            .unwrap_err(),
            svc.ensure_ready().unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), "ConfigurationError");
        }
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn lists_databases() {
        let fake = Arc::new(
            ScriptedAthena::new().with_databases(&[("analytics", Some("Marts")), ("raw", None)]),
        );
        let text = service(&fake).list_databases().await.unwrap();
        assert!(text.contains("**analytics** - Marts"));
        assert!(text.contains("**raw**"));
        assert_eq!(fake.calls(), vec![Call::ListDatabases]);
    }

    #[tokio::test(start_paused = true)]
    async fn describe_without_table_runs_show_tables() {
        let fake = Arc::new(
            ScriptedAthena::new()
                .with_states(&[QueryState::Running, QueryState::Succeeded])
                .with_result(&["tab_name"], vec![vec![Some("events")], vec![Some("users")]]),
        );
        let req = DescribeRequest {
            database: Some("logs".into()),
            table: None,
        };

        let text = service(&fake).describe(&req).await.unwrap();

        assert!(text.contains("- events"));
        let submitted = fake.submissions();
        assert_eq!(submitted[0].sql, "SHOW TABLES IN logs");
        assert_eq!(submitted[0].database, "logs");
    }

    #[tokio::test]
    async fn describe_table_uses_metadata_api() {
        let fake = Arc::new(ScriptedAthena::new().with_table(TableSchema {
            name: "events".into(),
            table_type: None,
            columns: vec![SchemaColumn {
                name: "id".into(),
                data_type: "bigint".into(),
                comment: None,
            }],
            partition_keys: vec![],
        }));
        let req = DescribeRequest {
            database: None,
            table: Some("events".into()),
        };

        let text = service(&fake).describe(&req).await.unwrap();

        assert!(text.starts_with("Table 'default.events'"));
        assert!(text.contains("| id | bigint |"));
        assert_eq!(fake.calls(), vec![Call::TableMetadata]);
    }

    #[tokio::test]
    async fn connectivity_check_counts_databases() {
        let fake = Arc::new(
            ScriptedAthena::new().with_databases(&[("a", None), ("b", None), ("c", None)]),
        );
        assert_eq!(service(&fake).check_connectivity().await.unwrap(), 3);
    }
}
