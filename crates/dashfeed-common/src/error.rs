//! Error types shared across dashfeed crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared helpers
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SQL identifier '{0}': identifiers must be non-empty and free of control characters")]
    InvalidIdentifier(String),

    #[error("Invalid {kind} value: {value}")]
    InvalidSetting { kind: &'static str, value: String },

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl CommonError {
    pub fn invalid_setting(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            kind,
            value: value.into(),
        }
    }
}
