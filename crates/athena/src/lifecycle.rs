//! Query lifecycle: submit, poll until terminal, fetch results.
//!
//! [`QueryRunner::run`] hides Athena's asynchronous execution model behind a
//! single call:
//!
//! ```text
//! SUBMITTED -> POLLING -> FETCHING -> DONE
//!                     \-> FAILED | CANCELLED | TIMED_OUT
//! ```
//!
//! Polling backs off exponentially and is bounded by a hard deadline. Each
//! individual API call is retried a bounded number of times on transient
//! errors; query-level failures are reported, never retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::{AthenaApi, QueryExecution, QueryState, QuerySubmission};
use crate::config::AthenaConfig;
use crate::error::AthenaError;
use crate::result::{AthenaQueryResult, QueryMetadata};
use crate::validate::{self, QueryRequest};

/// `GetQueryResults` accepts at most this many rows per page.
const MAX_PAGE_SIZE: usize = 1_000;

const BACKOFF_FACTOR: u32 = 2;

/// Stand-in deadline when the configured timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Polling, retry and row-cap settings, derived from [`AthenaConfig`].
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub workgroup: String,
    pub default_database: String,
    pub output_location: String,
    pub timeout: Duration,
    pub poll_initial: Duration,
    pub poll_max: Duration,
    pub max_rows: usize,
    pub cancel_on_timeout: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RunnerSettings {
    /// Fails with [`AthenaError::Configuration`] if `config` is not runnable.
    pub fn from_config(config: &AthenaConfig) -> Result<Self, AthenaError> {
        config.validate()?;
        Ok(Self {
            workgroup: config.workgroup.clone(),
            default_database: config.database.clone(),
            output_location: config.output_location()?.to_string(),
            timeout: config.timeout(),
            poll_initial: config.poll_initial(),
            poll_max: config.poll_max(),
            max_rows: config.max_rows,
            cancel_on_timeout: config.cancel_on_timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }
}

/// Drives one query at a time from submission to a finished result.
///
/// Holds no per-query state, so one runner can serve any number of
/// concurrent invocations.
pub struct QueryRunner {
    api: Arc<dyn AthenaApi>,
    settings: RunnerSettings,
}

impl QueryRunner {
    pub fn new(api: Arc<dyn AthenaApi>, settings: RunnerSettings) -> Self {
        Self { api, settings }
    }

    /// Execute `request` and return its (possibly truncated) result set.
    pub async fn run(&self, request: &QueryRequest) -> Result<AthenaQueryResult, AthenaError> {
        let database = request
            .database
            .as_deref()
            .unwrap_or(&self.settings.default_database);

        if let Some(pattern) = validate::destructive_pattern(&request.sql) {
            warn!(pattern, database, "Statement contains a destructive pattern");
        }
        info!(
            database,
            sql = %validate::truncate_for_log(&request.sql),
            "Starting Athena query"
        );

        // 1. Submit
        let submission = QuerySubmission {
            sql: request.sql.clone(),
            database: database.to_string(),
            workgroup: self.settings.workgroup.clone(),
            output_location: self.settings.output_location.clone(),
        };
        let api = &self.api;
        let query_id = self
            .retrying("StartQueryExecution", || api.start_query(&submission))
            .await?;
        info!(query_id = %query_id, "Query execution started");

        // 2. Poll
        let execution = self.wait_for_completion(&query_id).await?;

        // 3. Fetch
        let row_cap = request
            .max_rows
            .map_or(self.settings.max_rows, |n| n.min(self.settings.max_rows));
        self.fetch_results(&execution, row_cap).await
    }

    /// Poll `GetQueryExecution` until the query reaches a terminal state or
    /// the deadline elapses.
    async fn wait_for_completion(&self, query_id: &str) -> Result<QueryExecution, AthenaError> {
        let start = Instant::now();
        let deadline = start
            .checked_add(self.settings.timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut delay = self.settings.poll_initial;
        let api = &self.api;

        loop {
            let execution = self
                .retrying("GetQueryExecution", || api.query_execution(query_id))
                .await?;

            debug!(
                query_id,
                state = %execution.state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling query status"
            );

            match execution.state {
                QueryState::Succeeded => return Ok(execution),
                QueryState::Failed => {
                    let reason = execution
                        .state_reason
                        .unwrap_or_else(|| "Unknown error".to_string());
                    error!(query_id, reason = %reason, "Query failed");
                    return Err(AthenaError::QueryFailed {
                        query_id: query_id.to_string(),
                        reason,
                    });
                }
                QueryState::Cancelled => {
                    let reason = execution
                        .state_reason
                        .unwrap_or_else(|| "cancelled".to_string());
                    warn!(query_id, reason = %reason, "Query was cancelled");
                    return Err(AthenaError::QueryCancelled {
                        query_id: query_id.to_string(),
                        reason,
                    });
                }
                QueryState::Queued | QueryState::Running => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(query_id).await);
            }

            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = self.backoff(delay);
        }
    }

    async fn timed_out(&self, query_id: &str) -> AthenaError {
        let seconds = self.settings.timeout.as_secs();
        if self.settings.cancel_on_timeout {
            warn!(query_id, timeout_seconds = seconds, "Query timed out, cancelling");
            if let Err(e) = self.api.stop_query(query_id).await {
                warn!(query_id, error = %e, "Cancel request failed");
            }
        } else {
            warn!(
                query_id,
                timeout_seconds = seconds,
                "Query timed out, leaving it running"
            );
        }
        AthenaError::QueryTimeout {
            query_id: query_id.to_string(),
            seconds,
        }
    }

    /// Page through `GetQueryResults` until pagination is exhausted or the
    /// row cap is reached.
    async fn fetch_results(
        &self,
        execution: &QueryExecution,
        row_cap: usize,
    ) -> Result<AthenaQueryResult, AthenaError> {
        let query_id = execution.execution_id.as_str();
        let api = &self.api;

        let mut columns = Vec::new();
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        let mut next_token: Option<String> = None;
        let mut first_page = true;
        let mut truncated = false;

        loop {
            let remaining = row_cap - rows.len();
            // Leave room for the header echo on the first page.
            let page_size = (remaining + usize::from(first_page)).clamp(1, MAX_PAGE_SIZE) as i32;
            let token = next_token.as_deref();

            let page = self
                .retrying("GetQueryResults", || {
                    api.result_page(query_id, token, page_size, first_page)
                })
                .await?;

            if first_page {
                columns = page.columns;
            }
            first_page = false;

            let page_rows = page.rows.len();
            rows.extend(page.rows.into_iter().take(remaining));

            if page_rows > remaining {
                truncated = true;
                break;
            }
            match page.next_token {
                Some(token) if rows.len() >= row_cap => {
                    debug!(query_id, token_len = token.len(), "Row cap reached with pages left");
                    truncated = true;
                    break;
                }
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(
            query_id,
            columns = columns.len(),
            rows = rows.len(),
            truncated,
            "Fetched Athena results"
        );

        Ok(AthenaQueryResult {
            columns,
            rows,
            truncated,
            metadata: QueryMetadata::from(execution),
        })
    }

    /// Next wait after `delay`, never above `poll_max`.
    fn backoff(&self, delay: Duration) -> Duration {
        delay.saturating_mul(BACKOFF_FACTOR).min(self.settings.poll_max)
    }

    /// Run `call`, retrying transient failures with exponential backoff.
    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, AthenaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AthenaError>>,
    {
        let mut attempt: u32 = 0;
        let mut delay = self.settings.retry_delay.min(self.settings.poll_max);
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %e, "Transient error, retrying");
                    tokio::time::sleep(delay).await;
                    delay = self.backoff(delay);
                }
                other => return other,
            }
        }
    }
}
