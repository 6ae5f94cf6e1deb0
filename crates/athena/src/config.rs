use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::AthenaError;
use crate::validate;

/// Region used when none of the region variables are set.
const DEFAULT_REGION: &str = "us-east-1";

/// Data catalog queried by the metadata APIs.
pub const DEFAULT_CATALOG: &str = "AwsDataCatalog";

// ── Env helpers ──────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

struct Lookup<F: Fn(&str) -> Option<String>>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn opt(&self, key: &str) -> Option<String> {
        non_empty((self.0)(key))
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.opt(k))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.opt(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "unparseable config value, using default");
                default
            }),
            None => default,
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.opt(key) {
            Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            None => default,
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────

/// Where the AWS SDK should get credentials from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Static keys taken from the environment.
    Explicit {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    /// A named profile from the shared AWS config files.
    Profile(String),
    /// The SDK's default provider chain (env, web identity, IMDS, ...).
    Default,
}

impl CredentialSource {
    pub fn label(&self) -> &'static str {
        match self {
            CredentialSource::Explicit { .. } => "explicit",
            CredentialSource::Profile(_) => "profile",
            CredentialSource::Default => "default-chain",
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Explicit { access_key_id, .. } => f
                .debug_struct("Explicit")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            CredentialSource::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            CredentialSource::Default => f.write_str("Default"),
        }
    }
}

// ── AthenaConfig ─────────────────────────────────────────────────

/// Process-wide configuration, captured once at startup.
///
/// Built from environment variables by [`AthenaConfig::from_env`] and passed
/// explicitly to the client factory, the query runner and the service.
#[derive(Debug, Clone)]
pub struct AthenaConfig {
    /// AWS region for Athena queries.
    pub region: String,
    /// Athena workgroup queries run under.
    pub workgroup: String,
    /// Data catalog for metadata calls.
    pub catalog: String,
    /// Database used when a tool call does not name one.
    pub database: String,
    /// S3 path for query results. Mandatory for query execution.
    pub output_location: Option<String>,
    pub credentials: CredentialSource,
    /// Local wait deadline per query.
    pub timeout_seconds: u64,
    /// First poll interval.
    pub poll_initial_ms: u64,
    /// Poll interval ceiling.
    pub poll_max_ms: u64,
    /// Hard cap on rows fetched per query.
    pub max_rows: usize,
    /// Ceiling on trimmed SQL length.
    pub max_query_length: usize,
    /// Issue StopQueryExecution when the local deadline elapses.
    pub cancel_on_timeout: bool,
    /// Retries for transient failures of a single API call.
    pub max_retries: u32,
    /// Delay before the first transient retry; doubles on each attempt.
    pub retry_delay_ms: u64,
}

impl Default for AthenaConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            workgroup: "primary".to_string(),
            catalog: DEFAULT_CATALOG.to_string(),
            database: "default".to_string(),
            output_location: None,
            credentials: CredentialSource::Default,
            timeout_seconds: 300,
            poll_initial_ms: 1_000,
            poll_max_ms: 30_000,
            max_rows: 1_000,
            max_query_length: 10_000,
            cancel_on_timeout: false,
            max_retries: 3,
            retry_delay_ms: 200,
        }
    }
}

impl AthenaConfig {
    /// Build config from process environment variables.
    ///
    /// Region resolution order is `ATHENA_REGION`, `AWS_DEFAULT_REGION`,
    /// `AWS_REGION`. The output location is read from
    /// `AWS_S3_OUTPUT_LOCATION`, falling back to `ATHENA_OUTPUT_LOCATION`.
    pub fn from_env() -> Self {
        Self::from_lookup(env_opt)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Lookup(lookup);
        let defaults = Self::default();

        let credentials = match (
            env.opt("AWS_ACCESS_KEY_ID"),
            env.opt("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => CredentialSource::Explicit {
                access_key_id,
                secret_access_key,
                session_token: env.opt("AWS_SESSION_TOKEN"),
            },
            _ => match env.opt("AWS_PROFILE") {
                Some(profile) => CredentialSource::Profile(profile),
                None => CredentialSource::Default,
            },
        };

        Self {
            region: env
                .first(&["ATHENA_REGION", "AWS_DEFAULT_REGION", "AWS_REGION"])
                .unwrap_or(defaults.region),
            workgroup: env.or("ATHENA_WORKGROUP", &defaults.workgroup),
            catalog: env.or("ATHENA_CATALOG", &defaults.catalog),
            database: env.or("ATHENA_DATABASE", &defaults.database),
            output_location: env.first(&["AWS_S3_OUTPUT_LOCATION", "ATHENA_OUTPUT_LOCATION"]),
            credentials,
            timeout_seconds: env.parsed("ATHENA_TIMEOUT_SECONDS", defaults.timeout_seconds),
            poll_initial_ms: env.parsed("ATHENA_POLL_INITIAL_MS", defaults.poll_initial_ms),
            poll_max_ms: env.parsed("ATHENA_POLL_MAX_MS", defaults.poll_max_ms),
            max_rows: env.parsed("ATHENA_MAX_ROWS", defaults.max_rows),
            max_query_length: env.parsed("ATHENA_MAX_QUERY_LENGTH", defaults.max_query_length),
            cancel_on_timeout: env.flag("ATHENA_CANCEL_ON_TIMEOUT", defaults.cancel_on_timeout),
            max_retries: env.parsed("ATHENA_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env.parsed("ATHENA_RETRY_DELAY_MS", defaults.retry_delay_ms),
        }
    }

    /// Check the settings query execution depends on.
    ///
    /// Fails with [`AthenaError::Configuration`] when the output location is
    /// missing or not an `s3://bucket/...` URI, or the workgroup name is invalid.
    pub fn validate(&self) -> Result<(), AthenaError> {
        validate::output_location(self.output_location.as_deref())?;
        if !validate::is_workgroup_name(&self.workgroup) {
            return Err(AthenaError::Configuration(format!(
                "Invalid ATHENA_WORKGROUP '{}': expected 1-128 letters, digits, '.', '_' or '-'",
                self.workgroup
            )));
        }
        Ok(())
    }

    /// Validated output location. Call after [`AthenaConfig::validate`].
    pub fn output_location(&self) -> Result<&str, AthenaError> {
        validate::output_location(self.output_location.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_initial(&self) -> Duration {
        Duration::from_millis(self.poll_initial_ms.max(1))
    }

    pub fn poll_max(&self) -> Duration {
        Duration::from_millis(self.poll_max_ms.max(self.poll_initial_ms).max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn from_pairs(pairs: &[(&str, &str)]) -> AthenaConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AthenaConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = from_pairs(&[]);
        assert_eq!(cfg.region, "us-east-1");
        assert_eq!(cfg.workgroup, "primary");
        assert_eq!(cfg.catalog, "AwsDataCatalog");
        assert_eq!(cfg.database, "default");
        assert_eq!(cfg.output_location, None);
        assert_eq!(cfg.credentials, CredentialSource::Default);
        assert_eq!(cfg.timeout_seconds, 300);
        assert_eq!(cfg.max_rows, 1_000);
        assert_eq!(cfg.poll_initial(), Duration::from_secs(1));
        assert_eq!(cfg.poll_max(), Duration::from_secs(30));
        assert!(!cfg.cancel_on_timeout);
    }

    #[test]
    fn region_resolution_order() {
        let cfg = from_pairs(&[("AWS_REGION", "us-west-2")]);
        assert_eq!(cfg.region, "us-west-2");

        let cfg = from_pairs(&[("AWS_DEFAULT_REGION", "eu-west-1"), ("AWS_REGION", "us-west-2")]);
        assert_eq!(cfg.region, "eu-west-1");

        let cfg = from_pairs(&[("AWS_DEFAULT_REGION", "eu-west-1"), ("ATHENA_REGION", "ap-south-1")]);
        assert_eq!(cfg.region, "ap-south-1");
    }

    #[test]
    fn explicit_credentials_win_over_profile() {
        let cfg = from_pairs(&[
            ("AWS_ACCESS_KEY_ID", "AKIA123"),
            ("AWS_SECRET_ACCESS_KEY", "shh"),
            ("AWS_PROFILE", "analytics"),
        ]);
        assert_eq!(cfg.credentials.label(), "explicit");
        assert!(!format!("{:?}", cfg.credentials).contains("shh"));

        // A lone access key is not enough for explicit credentials.
        let cfg = from_pairs(&[("AWS_ACCESS_KEY_ID", "AKIA123"), ("AWS_PROFILE", "analytics")]);
        assert_eq!(cfg.credentials, CredentialSource::Profile("analytics".into()));
    }

    #[test]
    fn output_location_prefers_s3_variable() {
        let cfg = from_pairs(&[
            ("ATHENA_OUTPUT_LOCATION", "s3://fallback/"),
            ("AWS_S3_OUTPUT_LOCATION", "s3://primary/results/"),
        ]);
        assert_eq!(cfg.output_location.as_deref(), Some("s3://primary/results/"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let cfg = from_pairs(&[("ATHENA_MAX_ROWS", "lots"), ("ATHENA_TIMEOUT_SECONDS", "-5")]);
        assert_eq!(cfg.max_rows, 1_000);
        assert_eq!(cfg.timeout_seconds, 300);

        let cfg = from_pairs(&[("ATHENA_MAX_ROWS", "50"), ("ATHENA_CANCEL_ON_TIMEOUT", "1")]);
        assert_eq!(cfg.max_rows, 50);
        assert!(cfg.cancel_on_timeout);
    }

    #[test]
    fn validate_requires_output_location() {
        let cfg = AthenaConfig::default();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("AWS_S3_OUTPUT_LOCATION"));

        let cfg = AthenaConfig {
            output_location: Some("s3://bucket/athena/".into()),
            ..AthenaConfig::default()
        };
        assert!(cfg.validate().is_ok());

        let cfg = AthenaConfig {
            output_location: Some("s3://bucket/athena/".into()),
            workgroup: "bad group!".into(),
            ..AthenaConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_env_reads_process_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        env::set_var("ATHENA_WORKGROUP", "etl");
        env::set_var("AWS_S3_OUTPUT_LOCATION", "s3://env-bucket/out/");

        let cfg = AthenaConfig::from_env();
        assert_eq!(cfg.workgroup, "etl");
        assert_eq!(cfg.output_location.as_deref(), Some("s3://env-bucket/out/"));

        env::remove_var("ATHENA_WORKGROUP");
        env::remove_var("AWS_S3_OUTPUT_LOCATION");
    }
}
