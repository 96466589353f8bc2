use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountKey;
use super::common::Identifiable;
use super::journal::EntryKind;

/// One append-only posting of a journal allocation into an account timeline.
///
/// `amount` is already signed for the key it lives on. `seq` is assigned by the book on
/// insert and keeps same-day ordering deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub business_id: Uuid,
    pub journal_id: Uuid,
    pub allocation_id: Uuid,
    pub key: AccountKey,
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: EntryKind,
    pub rentable_id: Uuid,
    #[serde(default)]
    pub seq: u64,
}

impl LedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        business_id: Uuid,
        journal_id: Uuid,
        allocation_id: Uuid,
        key: AccountKey,
        date: NaiveDate,
        amount: f64,
        kind: EntryKind,
        rentable_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            journal_id,
            allocation_id,
            key,
            date,
            amount,
            kind,
            rentable_id,
            seq: 0,
        }
    }
}

impl Identifiable for LedgerEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}
