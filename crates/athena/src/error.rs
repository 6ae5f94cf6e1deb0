//! Error taxonomy shared by every Athena operation.

/// A tool argument failed parse-and-validate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid argument '{field}': {reason}")]
pub struct ValidationError {
    /// Name of the offending argument.
    pub field: String,
    /// What is wrong with it.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during Athena operations.
#[derive(Debug, thiserror::Error)]
pub enum AthenaError {
    /// Bad tool arguments. Raised before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing or invalid process configuration.
    #[error("{0}")]
    Configuration(String),

    /// The query execution failed on the Athena side.
    #[error("Query {query_id} failed: {reason}")]
    QueryFailed { query_id: String, reason: String },

    /// The query was cancelled (either by the user or by Athena).
    #[error("Query {query_id} was cancelled: {reason}")]
    QueryCancelled { query_id: String, reason: String },

    /// The local wait deadline elapsed before the query finished.
    #[error("Query {query_id} timed out after {seconds}s (still inspectable by execution id)")]
    QueryTimeout { query_id: String, seconds: u64 },

    /// Network or throttling hiccup. Retried a bounded number of times.
    #[error("Transient AWS error: {0}")]
    Transient(String),

    /// A non-retryable error reported by the AWS service.
    #[error("AWS error ({code}): {message}")]
    AwsSdk { code: String, message: String },

    /// Failed to parse Athena response data.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl AthenaError {
    /// Stable category name used in user-facing error summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            AthenaError::Validation(_) => "ValidationError",
            AthenaError::Configuration(_) => "ConfigurationError",
            AthenaError::QueryFailed { .. } | AthenaError::QueryCancelled { .. } => {
                "ExecutionError"
            }
            AthenaError::QueryTimeout { .. } => "TimeoutError",
            AthenaError::Transient(_) => "TransientError",
            AthenaError::AwsSdk { .. } => "ServiceError",
            AthenaError::ParseError(_) => "ParseError",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AthenaError::Transient(_))
    }

    /// Execution id attached to the error, if the query got that far.
    pub fn query_id(&self) -> Option<&str> {
        match self {
            AthenaError::QueryFailed { query_id, .. }
            | AthenaError::QueryCancelled { query_id, .. }
            | AthenaError::QueryTimeout { query_id, .. } => Some(query_id),
            _ => None,
        }
    }
}
