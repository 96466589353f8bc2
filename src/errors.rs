use std::result::Result as StdResult;

use thiserror::Error;

/// Error type shared by the posting, checkpoint and query layers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Integrity violation: {0}")]
    Integrity(String),
    #[error("Concurrency conflict: {0}")]
    Concurrency(String),
    #[error("Persistence error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = StdResult<T, LedgerError>;

/// Coarse classification used by batch outcome reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Integrity,
    Concurrency,
    Storage,
    Config,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Integrity(_) => ErrorKind::Integrity,
            LedgerError::Concurrency(_) => ErrorKind::Concurrency,
            LedgerError::Storage(_) => ErrorKind::Storage,
            LedgerError::Config(_) => ErrorKind::Config,
        }
    }

    /// Fatal errors abort the current unit of work instead of skipping a record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::Integrity(_) | LedgerError::Storage(_) | LedgerError::Config(_)
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        LedgerError::NotFound(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        LedgerError::Integrity(message.into())
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        LedgerError::Concurrency(message.into())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}
