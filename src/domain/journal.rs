use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{amounts_match, Identifiable};
use super::marker::MarkerState;
use crate::errors::{LedgerError, Result};

/// The kind of event an entry originates from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Assessment,
    Receipt,
}

impl EntryKind {
    /// Tie-break rank for entries sharing a date: charges list before payments.
    pub fn rank(self) -> u8 {
        match self {
            EntryKind::Assessment => 0,
            EntryKind::Receipt => 1,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Assessment => f.pad("Assessment"),
            EntryKind::Receipt => f.pad("Receipt"),
        }
    }
}

/// What a journal was posted from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JournalSource {
    Assessment { assessment_id: Uuid },
    Receipt { receipt_id: Uuid },
}

impl JournalSource {
    pub fn kind(&self) -> EntryKind {
        match self {
            JournalSource::Assessment { .. } => EntryKind::Assessment,
            JournalSource::Receipt { .. } => EntryKind::Receipt,
        }
    }

    pub fn source_id(&self) -> Uuid {
        match self {
            JournalSource::Assessment { assessment_id } => *assessment_id,
            JournalSource::Receipt { receipt_id } => *receipt_id,
        }
    }
}

/// Idempotency key: a source posts at most once per occurrence date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostingKey {
    pub source_id: Uuid,
    pub date: NaiveDate,
}

/// The portion of a journal attributed to one rentable/assessment under one rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalAllocation {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub rentable_id: Uuid,
    pub assessment_id: Uuid,
    pub amount: f64,
    pub posting_rule: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journal {
    pub id: Uuid,
    pub business_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_agreement_id: Option<Uuid>,
    pub date: NaiveDate,
    pub amount: f64,
    pub source: JournalSource,
    pub allocations: Vec<JournalAllocation>,
}

impl Journal {
    pub fn new(
        business_id: Uuid,
        rental_agreement_id: Option<Uuid>,
        date: NaiveDate,
        amount: f64,
        source: JournalSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            rental_agreement_id,
            date,
            amount,
            source,
            allocations: Vec::new(),
        }
    }

    pub fn push_allocation(
        &mut self,
        rentable_id: Uuid,
        assessment_id: Uuid,
        amount: f64,
        posting_rule: impl Into<String>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.allocations.push(JournalAllocation {
            id,
            journal_id: self.id,
            rentable_id,
            assessment_id,
            amount,
            posting_rule: posting_rule.into(),
        });
        id
    }

    pub fn kind(&self) -> EntryKind {
        self.source.kind()
    }

    pub fn posting_key(&self) -> PostingKey {
        PostingKey {
            source_id: self.source.source_id(),
            date: self.date,
        }
    }

    pub fn allocated(&self) -> f64 {
        self.allocations.iter().map(|alloc| alloc.amount).sum()
    }

    /// Allocations must exist, belong to this journal and add up to its amount.
    pub fn verify_allocations(&self, epsilon: f64) -> Result<()> {
        if self.allocations.is_empty() {
            return Err(LedgerError::integrity(format!(
                "journal {} has no allocations",
                self.id
            )));
        }
        if let Some(stray) = self.allocations.iter().find(|a| a.journal_id != self.id) {
            return Err(LedgerError::integrity(format!(
                "allocation {} does not belong to journal {}",
                stray.id, self.id
            )));
        }
        let allocated = self.allocated();
        if !amounts_match(allocated, self.amount, epsilon) {
            return Err(LedgerError::integrity(format!(
                "journal {} allocations total {:.2} but the journal is {:.2}",
                self.id, allocated, self.amount
            )));
        }
        Ok(())
    }
}

impl Identifiable for Journal {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Lock state of a business's journal over a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalMarker {
    pub id: Uuid,
    pub business_id: Uuid,
    pub state: MarkerState,
    pub dt_start: NaiveDate,
    pub dt_stop: NaiveDate,
}

impl JournalMarker {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.dt_start && date < self.dt_stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(amount: f64) -> Journal {
        let date = NaiveDate::from_ymd_opt(2015, 3, 1).unwrap();
        Journal::new(
            Uuid::new_v4(),
            None,
            date,
            amount,
            JournalSource::Assessment {
                assessment_id: Uuid::new_v4(),
            },
        )
    }

    #[test]
    fn verify_detects_unbalanced_allocations() {
        let mut jnl = journal(1200.0);
        jnl.push_allocation(Uuid::new_v4(), Uuid::new_v4(), 1000.0, "d 1 _, c 2 _");
        assert!(matches!(
            jnl.verify_allocations(0.005),
            Err(LedgerError::Integrity(_))
        ));
        jnl.push_allocation(Uuid::new_v4(), Uuid::new_v4(), 200.0, "d 1 _, c 2 _");
        jnl.verify_allocations(0.005).expect("balanced journal");
    }

    #[test]
    fn journal_without_allocations_is_an_integrity_error() {
        assert!(matches!(
            journal(10.0).verify_allocations(0.005),
            Err(LedgerError::Integrity(_))
        ));
    }

    #[test]
    fn assessments_rank_before_receipts() {
        assert!(EntryKind::Assessment.rank() < EntryKind::Receipt.rank());
    }
}
