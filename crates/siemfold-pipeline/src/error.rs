use siemfold_grouper::GrouperError;
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Records key '{0}' missing or not an array")]
    MissingRecords(String),
    #[error("Expected a JSON array, object or JSON lines")]
    UnexpectedShape,
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Failed to write record: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid grouping configuration: {0}")]
    Grouper(#[from] GrouperError),
    #[error("Fetch failed after {attempts} attempt(s): {source}")]
    FetchExhausted { attempts: u32, source: BoxError },
    #[error("Forwarding failed after {sent} record(s): {source}")]
    Forward { sent: usize, source: BoxError },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No tenants configured")]
    NoTenants,
    #[error("Tenant name must not be empty")]
    EmptyTenantName,
    #[error("Duplicate tenant '{0}'")]
    DuplicateTenant(String),
    #[error("interval_secs must be positive")]
    ZeroInterval,
    #[error("retry.attempts must be positive")]
    ZeroAttempts,
    #[error("Tenant '{tenant}': {source}")]
    Grouping {
        tenant: String,
        source: GrouperError,
    },
}
