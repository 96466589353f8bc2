pub mod balance_service;
pub mod batch_service;
pub mod import_service;
pub mod journal_poster;
pub mod ledger_writer;
pub mod marker_service;

pub use balance_service::BalanceService;
pub use batch_service::{BatchReport, BatchService};
pub use import_service::{ActivityFile, ImportReport, ImportService};
pub use journal_poster::JournalPoster;
pub use ledger_writer::LedgerWriter;
pub use marker_service::MarkerService;

use std::fmt;

use serde::Serialize;

use crate::errors::{ErrorKind, LedgerError};

/// What happened to one record during a batch step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OutcomeStatus {
    Succeeded,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub subject: String,
    pub status: OutcomeStatus,
}

impl RecordOutcome {
    pub fn succeeded(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: OutcomeStatus::Succeeded,
        }
    }

    pub fn skipped(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: OutcomeStatus::Skipped(reason.into()),
        }
    }

    pub fn failed(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: OutcomeStatus::Failed(reason.into()),
        }
    }

    /// Turns a non-fatal record error into an outcome. Closed periods are skips, bad
    /// input is a failure; fatal errors are handed back for the caller to abort on.
    pub fn from_error(subject: impl Into<String>, err: LedgerError) -> Result<Self, LedgerError> {
        if err.is_fatal() {
            tracing::error!(error = %err, "aborting unit of work");
            return Err(err);
        }
        let subject = subject.into();
        tracing::warn!(record = %subject, error = %err, "record not applied");
        Ok(match err.kind() {
            ErrorKind::Concurrency => Self::skipped(subject, err.to_string()),
            _ => Self::failed(subject, err.to_string()),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded)
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            OutcomeStatus::Succeeded => write!(f, "ok      {}", self.subject),
            OutcomeStatus::Skipped(reason) => write!(f, "skipped {}: {}", self.subject, reason),
            OutcomeStatus::Failed(reason) => write!(f, "failed  {}: {}", self.subject, reason),
        }
    }
}
