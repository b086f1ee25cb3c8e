// Error types for the ingestion pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failures while issuing a request. Never retried.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Network error requesting {endpoint}: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid request header '{0}'")]
    InvalidHeader(String),

    #[error("HTTP client error: {0}")]
    Client(reqwest::Error),
}

/// Failures turning a response body into records. Retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("No source found: {0}")]
    NoSourceFound(String),

    #[error("Empty source: {0}")]
    EmptySource(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Failures while replacing table contents. Nothing is committed.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Value too long: {0}")]
    ValueTooLong(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid schema: {0}")]
    Schema(#[from] dashfeed_common::CommonError),
}

impl WriteError {
    /// Classify a database error by its SQLSTATE
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if let Some(code) = db.code() {
                if code == "22001" {
                    return WriteError::ValueTooLong(db.message().to_string());
                }
                if code.starts_with("23") {
                    return WriteError::ConstraintViolation(db.message().to_string());
                }
            }
        }
        WriteError::Database(err)
    }
}

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Any failure that aborts a run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: ExtractionError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl IngestError {
    /// Transient failures are worth another attempt after a delay
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::Extraction(_))
    }
}
