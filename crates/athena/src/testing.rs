//! Scripted in-memory [`AthenaApi`] for tests.
//!
//! Records every call so tests can assert on what reached the "network".

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::api::{
    AthenaApi, DatabaseInfo, QueryExecution, QueryState, QuerySubmission, ResultPage,
    TableSchema,
};
use crate::error::AthenaError;
use crate::result::AthenaColumn;

/// Which endpoint a recorded call hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start,
    Status,
    Results,
    Stop,
    ListDatabases,
    TableMetadata,
}

#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
    submissions: Vec<QuerySubmission>,
    status_reads: usize,
    transient_left: u32,
}

/// Fake Athena driven by a fixed script.
///
/// Status reads walk through `states`, repeating the last one forever; an
/// empty script reports SUCCEEDED straight away. Results are served from an
/// in-memory table, `page_size` rows at a time, with the offset as page token.
/// With [`ScriptedAthena::with_header_echo`] the table is preceded by a row of
/// column labels that occupies a slot of the first page, as Athena does for
/// SELECT results, and is dropped before it reaches the caller.
pub struct ScriptedAthena {
    states: Vec<QueryState>,
    reason: Option<String>,
    columns: Vec<AthenaColumn>,
    rows: Vec<Vec<Option<String>>>,
    page_size: usize,
    header_echo: bool,
    databases: Vec<DatabaseInfo>,
    tables: Vec<TableSchema>,
    recorder: Mutex<Recorder>,
}

impl Default for ScriptedAthena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAthena {
    /// Execution id handed out by every `start_query`.
    pub const EXECUTION_ID: &'static str = "3f2a9c1e-0000-4000-8000-athenafake01";

    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            reason: None,
            columns: Vec::new(),
            rows: Vec::new(),
            page_size: usize::MAX,
            header_echo: false,
            databases: Vec::new(),
            tables: Vec::new(),
            recorder: Mutex::new(Recorder::default()),
        }
    }

    pub fn with_states(mut self, states: &[QueryState]) -> Self {
        self.states = states.to_vec();
        self
    }

    /// Terminate in `state` with the given engine reason.
    pub fn failing_with(mut self, state: QueryState, reason: &str) -> Self {
        self.states = vec![QueryState::Running, state];
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_result(mut self, columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> Self {
        self.columns = columns
            .iter()
            .map(|name| AthenaColumn::new(*name, "varchar"))
            .collect();
        self.rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.map(str::to_string)).collect())
            .collect();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_header_echo(mut self) -> Self {
        self.header_echo = true;
        self
    }

    /// The first `n` status reads fail with a transient error.
    pub fn with_transient_status_failures(self, n: u32) -> Self {
        self.lock().transient_left = n;
        self
    }

    pub fn with_databases(mut self, databases: &[(&str, Option<&str>)]) -> Self {
        self.databases = databases
            .iter()
            .map(|(name, description)| DatabaseInfo {
                name: name.to_string(),
                description: description.map(str::to_string),
            })
            .collect();
        self
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn submissions(&self) -> Vec<QuerySubmission> {
        self.lock().submissions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl AthenaApi for ScriptedAthena {
    async fn start_query(&self, submission: &QuerySubmission) -> Result<String, AthenaError> {
        let mut rec = self.lock();
        rec.calls.push(Call::Start);
        rec.submissions.push(submission.clone());
        Ok(Self::EXECUTION_ID.to_string())
    }

    async fn query_execution(&self, execution_id: &str) -> Result<QueryExecution, AthenaError> {
        let mut rec = self.lock();
        rec.calls.push(Call::Status);
        if rec.transient_left > 0 {
            rec.transient_left -= 1;
            return Err(AthenaError::Transient("ThrottlingException: Rate exceeded".into()));
        }

        let idx = rec.status_reads;
        rec.status_reads += 1;
        let state = match self.states.as_slice() {
            [] => QueryState::Succeeded,
            states => states[idx.min(states.len() - 1)],
        };

        let mut execution = QueryExecution::new(execution_id, state);
        execution.bytes_scanned = 2_048;
        execution.execution_time_ms = 150;
        if matches!(state, QueryState::Failed | QueryState::Cancelled) {
            execution.state_reason = self.reason.clone();
        }
        Ok(execution)
    }

    async fn result_page(
        &self,
        _execution_id: &str,
        next_token: Option<&str>,
        max_results: i32,
        first_page: bool,
    ) -> Result<ResultPage, AthenaError> {
        self.record(Call::Results);

        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|e| AthenaError::ParseError(format!("bad page token: {e}")))?,
            None => 0,
        };
        let take = usize::try_from(max_results.max(1))
            .unwrap_or(1)
            .min(self.page_size);
        let echo = usize::from(self.header_echo);
        let total = self.rows.len() + echo;
        let end = (offset + take).min(total);
        let start = offset.min(end);

        // Slot 0 is the header echo; it only ever lands on the first page.
        let rows = (start..end)
            .filter(|slot| !(first_page && *slot < echo))
            .map(|slot| match slot.checked_sub(echo) {
                Some(i) => self.rows[i].clone(),
                None => self.columns.iter().map(|c| Some(c.name.clone())).collect(),
            })
            .collect();

        Ok(ResultPage {
            columns: self.columns.clone(),
            rows,
            next_token: (end < total).then(|| end.to_string()),
        })
    }

    async fn stop_query(&self, _execution_id: &str) -> Result<(), AthenaError> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn list_databases(&self, _catalog: &str) -> Result<Vec<DatabaseInfo>, AthenaError> {
        self.record(Call::ListDatabases);
        Ok(self.databases.clone())
    }

    async fn table_metadata(
        &self,
        _catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<TableSchema, AthenaError> {
        self.record(Call::TableMetadata);
        self.tables
            .iter()
            .find(|t| t.name == table)
            .cloned()
            .ok_or_else(|| AthenaError::AwsSdk {
                code: "MetadataException".into(),
                message: format!("Table {table} not found in database {database}"),
            })
    }
}
