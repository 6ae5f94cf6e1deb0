//! Tests for AthenaConfig: environment loading and validation.

use std::env;
use std::sync::Mutex;

use athena_mcp_query::*;

// Env-based tests must run serially to avoid interfering with each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_athena_env() {
    let keys = [
        "ATHENA_REGION",
        "AWS_REGION",
        "AWS_DEFAULT_REGION",
        "ATHENA_WORKGROUP",
        "ATHENA_CATALOG",
        "ATHENA_DATABASE",
        "AWS_S3_OUTPUT_LOCATION",
        "ATHENA_OUTPUT_LOCATION",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "AWS_PROFILE",
        "ATHENA_TIMEOUT_SECONDS",
        "ATHENA_MAX_ROWS",
        "ATHENA_CANCEL_ON_TIMEOUT",
    ];
    for k in keys {
        env::remove_var(k);
    }
}

#[test]
fn test_config_from_env() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_athena_env();

    env::set_var("AWS_REGION", "eu-central-1");
    env::set_var("ATHENA_WORKGROUP", "analysts");
    env::set_var("ATHENA_DATABASE", "analytics");
    env::set_var("ATHENA_OUTPUT_LOCATION", "s3://my-bucket/results/");
    env::set_var("ATHENA_TIMEOUT_SECONDS", "600");
    env::set_var("ATHENA_MAX_ROWS", "250");
    env::set_var("ATHENA_CANCEL_ON_TIMEOUT", "true");
    env::set_var("AWS_PROFILE", "reporting");

    let cfg = AthenaConfig::from_env();

    assert_eq!(cfg.region, "eu-central-1");
    assert_eq!(cfg.workgroup, "analysts");
    assert_eq!(cfg.database, "analytics");
    assert_eq!(cfg.output_location.as_deref(), Some("s3://my-bucket/results/"));
    assert_eq!(cfg.timeout_seconds, 600);
    assert_eq!(cfg.max_rows, 250);
    assert!(cfg.cancel_on_timeout);
    assert_eq!(cfg.credentials, CredentialSource::Profile("reporting".into()));
    assert!(cfg.validate().is_ok());

    clear_athena_env();
}

#[test]
fn test_empty_env_uses_defaults_but_fails_validation() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_athena_env();

    let cfg = AthenaConfig::from_env();

    assert_eq!(cfg.region, "us-east-1");
    assert_eq!(cfg.workgroup, "primary");
    assert_eq!(cfg.catalog, "AwsDataCatalog");
    assert_eq!(cfg.credentials, CredentialSource::Default);

    let err = cfg.validate().unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
    assert!(err.to_string().contains("AWS_S3_OUTPUT_LOCATION"));
}

#[test]
fn test_secret_never_appears_in_debug() {
    let cfg = AthenaConfig {
        credentials: CredentialSource::Explicit {
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG".into(),
            session_token: None,
        },
        ..AthenaConfig::default()
    };

    let debug = format!("{cfg:?}");
    assert!(debug.contains("AKIAEXAMPLE"));
    assert!(!debug.contains("wJalrXUtnFEMI"));
}

#[tokio::test]
async fn test_factory_rejects_bad_output_location() {
    let cfg = AthenaConfig {
        output_location: Some("https://my-bucket/results/".into()),
        ..AthenaConfig::default()
    };

    let err = ClientFactory::create(&cfg).await.unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
    assert!(err.to_string().contains("must start with 's3://'"));
}

#[tokio::test]
async fn test_unconfigured_service_reports_configuration_error() {
    let service = AthenaService::connect(&AthenaConfig::default()).await;

    let err = service.list_databases().await.unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
    assert!(service.ensure_ready().is_err());
}
