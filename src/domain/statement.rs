//! Read-only views produced by balance queries. Never persisted.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::account::AccountKey;
use super::journal::EntryKind;
use super::ledger::LedgerEntry;
use super::marker::LedgerMarker;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatementEntry {
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub amount: f64,
    pub rentable_id: Uuid,
    pub journal_id: Uuid,
}

impl From<&LedgerEntry> for StatementEntry {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            date: entry.date,
            kind: entry.kind,
            amount: entry.amount,
            rentable_id: entry.rentable_id,
            journal_id: entry.journal_id,
        }
    }
}

/// Account activity over `[start, end)` anchored on the nearest settled marker.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statement {
    pub key: AccountKey,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub lm_start: LedgerMarker,
    pub gap: Vec<StatementEntry>,
    pub opening: f64,
    pub entries: Vec<StatementEntry>,
    pub closing: f64,
}

impl Statement {
    pub fn gap_total(&self) -> f64 {
        self.gap.iter().map(|entry| entry.amount).sum()
    }

    pub fn activity_total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.amount).sum()
    }
}

/// A ledger row with the account balance after it was applied.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerLine {
    pub entry: StatementEntry,
    pub balance: f64,
}
