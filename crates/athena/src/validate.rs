//! Parse-and-validate step for tool arguments.
//!
//! Host payloads arrive as loosely-typed JSON. Everything here turns them into
//! typed requests or a [`ValidationError`] naming the offending field, with no
//! side effects and no network calls.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{AthenaError, ValidationError};

/// Longest database/table identifier Athena accepts.
const MAX_IDENTIFIER_LEN: usize = 255;

/// Longest workgroup name Athena accepts.
const MAX_WORKGROUP_LEN: usize = 128;

/// Characters of SQL kept in log lines.
const LOG_SQL_CHARS: usize = 100;

/// Statement fragments worth a warning in the logs. Not rejected.
const DESTRUCTIVE_PATTERNS: &[&str] = &[
    "DROP DATABASE",
    "DROP TABLE",
    "DELETE FROM",
    "TRUNCATE",
    "ALTER TABLE",
    "CREATE USER",
    "DROP USER",
    "GRANT",
    "REVOKE",
];

const OUTPUT_LOCATION_EXAMPLE: &str = "Example: s3://your-bucket/athena-results/";

/// A validated `query_athena` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Trimmed SQL text.
    pub sql: String,
    /// Target database; `None` means the configured default.
    pub database: Option<String>,
    /// Caller-requested row limit, before clamping to the configured cap.
    pub max_rows: Option<usize>,
}

impl QueryRequest {
    /// Build a request for SQL issued internally (e.g. `SHOW TABLES`).
    pub fn internal(sql: impl Into<String>, database: &str) -> Self {
        Self {
            sql: sql.into(),
            database: Some(database.to_string()),
            max_rows: None,
        }
    }

    /// Parse `query_athena` arguments. `query` is accepted as an alias of `sql`.
    pub fn from_args(args: &Value, max_query_length: usize) -> Result<Self, ValidationError> {
        let args = as_object(args)?;

        let (field, raw) = match (args.get("sql"), args.get("query")) {
            (Some(v), _) => ("sql", v),
            (None, Some(v)) => ("query", v),
            (None, None) => return Err(ValidationError::new("sql", "is required")),
        };
        let sql = raw
            .as_str()
            .ok_or_else(|| ValidationError::new(field, "must be a string"))?;
        let sql = query_text(field, sql, max_query_length)?;

        Ok(Self {
            sql,
            database: optional_identifier(&args, "database")?,
            max_rows: optional_count(&args, "max_rows")?,
        })
    }
}

/// A validated `describe_data_structure` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeRequest {
    /// Database to describe; `None` means the configured default.
    pub database: Option<String>,
    /// Table to describe. Without it the database's tables are listed.
    pub table: Option<String>,
}

impl DescribeRequest {
    pub fn from_args(args: &Value) -> Result<Self, ValidationError> {
        let args = as_object(args)?;
        Ok(Self {
            database: optional_identifier(&args, "database")?,
            table: optional_identifier(&args, "table")?,
        })
    }
}

/// `list_databases` takes no arguments but still rejects non-object payloads.
pub fn no_args(args: &Value) -> Result<(), ValidationError> {
    as_object(args).map(|_| ())
}

fn as_object(args: &Value) -> Result<Cow<'_, Map<String, Value>>, ValidationError> {
    match args {
        Value::Null => Ok(Cow::Owned(Map::new())),
        Value::Object(map) => Ok(Cow::Borrowed(map)),
        _ => Err(ValidationError::new("arguments", "must be a JSON object")),
    }
}

fn query_text(field: &str, sql: &str, max_len: usize) -> Result<String, ValidationError> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    let len = sql.chars().count();
    if len > max_len {
        return Err(ValidationError::new(
            field,
            format!("is {len} characters, limit is {max_len}"),
        ));
    }
    Ok(sql.to_string())
}

fn optional_identifier(
    args: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, ValidationError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => {
            if is_identifier(name) {
                Ok(Some(name.clone()))
            } else {
                Err(ValidationError::new(
                    field,
                    format!("'{name}' must be 1-{MAX_IDENTIFIER_LEN} letters, digits or underscores"),
                ))
            }
        }
        Some(_) => Err(ValidationError::new(field, "must be a string")),
    }
}

fn optional_count(
    args: &Map<String, Value>,
    field: &str,
) -> Result<Option<usize>, ValidationError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| Some(usize::try_from(v).unwrap_or(usize::MAX)))
            .ok_or_else(|| ValidationError::new(field, "must be a non-negative integer")),
        Some(_) => Err(ValidationError::new(field, "must be a non-negative integer")),
    }
}

/// Database and table names: ASCII letters, digits and underscores.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Workgroup names additionally allow `.` and `-`.
pub fn is_workgroup_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_WORKGROUP_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Check the query result location and return it.
pub fn output_location(location: Option<&str>) -> Result<&str, AthenaError> {
    let location = match location.map(str::trim) {
        Some(l) if !l.is_empty() => l,
        _ => {
            return Err(AthenaError::Configuration(format!(
                "AWS_S3_OUTPUT_LOCATION environment variable is required to execute queries. {OUTPUT_LOCATION_EXAMPLE}"
            )))
        }
    };

    let Some(rest) = location.strip_prefix("s3://") else {
        return Err(AthenaError::Configuration(format!(
            "AWS_S3_OUTPUT_LOCATION must start with 's3://', got '{location}'. {OUTPUT_LOCATION_EXAMPLE}"
        )));
    };

    let bucket = rest.split('/').next().unwrap_or_default();
    let bucket_ok = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-'));
    if !bucket_ok {
        return Err(AthenaError::Configuration(format!(
            "Invalid AWS_S3_OUTPUT_LOCATION format: '{location}'. {OUTPUT_LOCATION_EXAMPLE}"
        )));
    }

    Ok(location)
}

/// First destructive pattern found in the statement, if any.
pub fn destructive_pattern(sql: &str) -> Option<&'static str> {
    let upper = sql.to_ascii_uppercase();
    DESTRUCTIVE_PATTERNS
        .iter()
        .copied()
        .find(|pattern| upper.contains(pattern))
}

/// Shorten SQL for log lines.
pub fn truncate_for_log(sql: &str) -> String {
    match sql.char_indices().nth(LOG_SQL_CHARS) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}
