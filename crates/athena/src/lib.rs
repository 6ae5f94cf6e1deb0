//! AWS Athena query layer for the athena-mcp tools.
//!
//! - **validate**: tool-argument parsing into typed requests
//! - **client**: SDK client factory and [`AthenaApi`] implementation
//! - **lifecycle**: submit / poll / fetch state machine
//! - **format**: text rendering of results and errors
//! - **service**: the operations behind each tool

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod result;
pub mod service;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api::{AthenaApi, DatabaseInfo, QueryExecution, QueryState, QuerySubmission, TableSchema};
pub use client::{ClientFactory, SdkAthenaClient};
pub use config::{AthenaConfig, CredentialSource};
pub use error::{AthenaError, ValidationError};
pub use lifecycle::{QueryRunner, RunnerSettings};
pub use result::{AthenaColumn, AthenaQueryResult, QueryMetadata};
pub use service::AthenaService;
pub use validate::{DescribeRequest, QueryRequest};
