use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    amounts_match, AccountKey, Assessment, Journal, JournalMarker, LedgerEntry, LedgerMarker,
    MarkerState, PostingKey, Receipt,
};
use crate::errors::{LedgerError, Result};

pub const BOOK_SCHEMA_VERSION: u32 = 1;

/// Ledger rows are ordered by `(business, key, date, seq)`.
pub type EntryIndex = (Uuid, AccountKey, NaiveDate, u64);
/// Markers are unique per `(business, key, dt_stop)`.
pub type MarkerIndex = (Uuid, AccountKey, NaiveDate);

/// In-memory state of one set of books.
///
/// Every collection is key-ordered so that range scans over an account timeline or its
/// marker chain are cheap. A `Book` is only ever mutated inside
/// [`LedgerStore::transact`](super::LedgerStore::transact) on a private clone.
#[derive(Debug, Clone, Default)]
pub struct Book {
    assessments: BTreeMap<Uuid, Assessment>,
    receipts: BTreeMap<Uuid, Receipt>,
    journals: BTreeMap<Uuid, Journal>,
    posted: BTreeMap<PostingKey, Uuid>,
    entries: BTreeMap<EntryIndex, LedgerEntry>,
    written: BTreeSet<Uuid>,
    markers: BTreeMap<MarkerIndex, LedgerMarker>,
    journal_markers: BTreeMap<(Uuid, NaiveDate), JournalMarker>,
    next_seq: u64,
    generation: u64,
}

/// Flat, versioned form of a [`Book`] used by storage backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    #[serde(default)]
    pub journals: Vec<Journal>,
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
    #[serde(default)]
    pub markers: Vec<LedgerMarker>,
    #[serde(default)]
    pub journal_markers: Vec<JournalMarker>,
    #[serde(default)]
    pub next_seq: u64,
    /// Number of commits behind this snapshot. Backends refuse to persist a snapshot
    /// whose predecessor is not the one they currently hold.
    #[serde(default)]
    pub generation: u64,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    // -- assessments and receipts -------------------------------------------------

    pub fn insert_assessment(&mut self, assessment: Assessment) -> Result<()> {
        assessment.validate()?;
        if self.assessments.contains_key(&assessment.id) {
            return Err(LedgerError::validation(format!(
                "assessment {} already exists",
                assessment.id
            )));
        }
        self.assessments.insert(assessment.id, assessment);
        Ok(())
    }

    /// Replaces an assessment that has not been posted yet. Resubmitting an identical
    /// assessment is a no-op even after posting.
    pub fn update_assessment(&mut self, assessment: Assessment) -> Result<()> {
        match self.assessments.get(&assessment.id) {
            None => {
                return Err(LedgerError::not_found(format!(
                    "assessment {}",
                    assessment.id
                )))
            }
            Some(current) if *current == assessment => return Ok(()),
            Some(_) => {}
        }
        if self.has_journals_for(assessment.id) {
            return Err(LedgerError::validation(format!(
                "assessment {} already has posted journals and can no longer change",
                assessment.id
            )));
        }
        assessment.validate()?;
        self.assessments.insert(assessment.id, assessment);
        Ok(())
    }

    pub fn insert_receipt(&mut self, receipt: Receipt, epsilon: f64) -> Result<()> {
        receipt.validate(epsilon)?;
        if self.receipts.contains_key(&receipt.id) {
            return Err(LedgerError::validation(format!(
                "receipt {} already exists",
                receipt.id
            )));
        }
        self.receipts.insert(receipt.id, receipt);
        Ok(())
    }

    pub fn assessment(&self, id: Uuid) -> Option<&Assessment> {
        self.assessments.get(&id)
    }

    pub fn receipt(&self, id: Uuid) -> Option<&Receipt> {
        self.receipts.get(&id)
    }

    pub fn assessments_for(&self, business_id: Uuid) -> impl Iterator<Item = &Assessment> {
        self.assessments
            .values()
            .filter(move |asmt| asmt.business_id == business_id)
    }

    pub fn receipts_for(&self, business_id: Uuid) -> impl Iterator<Item = &Receipt> {
        self.receipts
            .values()
            .filter(move |rcpt| rcpt.business_id == business_id)
    }

    // -- journals -----------------------------------------------------------------

    pub fn is_posted(&self, key: &PostingKey) -> bool {
        self.posted.contains_key(key)
    }

    pub fn has_journals_for(&self, source_id: Uuid) -> bool {
        let from = PostingKey {
            source_id,
            date: NaiveDate::MIN,
        };
        let to = PostingKey {
            source_id,
            date: NaiveDate::MAX,
        };
        self.posted.range(from..=to).next().is_some()
    }

    pub fn insert_journal(&mut self, journal: Journal, epsilon: f64) -> Result<()> {
        journal.verify_allocations(epsilon)?;
        let key = journal.posting_key();
        if let Some(existing) = self.posted.get(&key) {
            return Err(LedgerError::integrity(format!(
                "source {} already posted on {} as journal {}",
                key.source_id, key.date, existing
            )));
        }
        self.posted.insert(key, journal.id);
        self.journals.insert(journal.id, journal);
        Ok(())
    }

    pub fn journal(&self, id: Uuid) -> Option<&Journal> {
        self.journals.get(&id)
    }

    /// Journals of a business dated in `[start, end)`, ordered by date.
    pub fn journals_in(
        &self,
        business_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<&Journal> {
        let mut found: Vec<&Journal> = self
            .journals
            .values()
            .filter(|jnl| jnl.business_id == business_id)
            .filter(|jnl| jnl.date >= start && jnl.date < end)
            .collect();
        found.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.kind().rank().cmp(&b.kind().rank()))
        });
        found
    }

    pub fn journal_count(&self) -> usize {
        self.journals.len()
    }

    // -- ledger rows --------------------------------------------------------------

    pub fn is_written(&self, journal_id: Uuid) -> bool {
        self.written.contains(&journal_id)
    }

    /// Appends a row, stamping it with the next insertion sequence number.
    pub fn append_entry(&mut self, mut entry: LedgerEntry) -> u64 {
        self.next_seq += 1;
        entry.seq = self.next_seq;
        self.written.insert(entry.journal_id);
        let index = (entry.business_id, entry.key.clone(), entry.date, entry.seq);
        self.entries.insert(index, entry);
        self.next_seq
    }

    /// Rows for one account key dated in `[from, to)`, in `(date, seq)` order.
    pub fn entries(
        &self,
        business_id: Uuid,
        key: &AccountKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &LedgerEntry> {
        let lower = (business_id, key.clone(), from, 0);
        let upper = (business_id, key.clone(), to.max(from), 0);
        self.entries.range(lower..upper).map(|(_, entry)| entry)
    }

    pub fn sum_entries(
        &self,
        business_id: Uuid,
        key: &AccountKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> f64 {
        self.entries(business_id, key, from, to)
            .map(|entry| entry.amount)
            .sum()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Every account key of a business that has rows or markers.
    pub fn account_keys(&self, business_id: Uuid) -> BTreeSet<AccountKey> {
        self.entries
            .keys()
            .filter(|(business, ..)| *business == business_id)
            .map(|(_, key, ..)| key.clone())
            .chain(
                self.markers
                    .keys()
                    .filter(|(business, ..)| *business == business_id)
                    .map(|(_, key, _)| key.clone()),
            )
            .collect()
    }

    // -- ledger markers -----------------------------------------------------------

    /// The chain of markers for one key, ordered by `dt_stop`.
    pub fn markers(&self, business_id: Uuid, key: &AccountKey) -> Vec<&LedgerMarker> {
        let lower = (business_id, key.clone(), NaiveDate::MIN);
        let upper = (business_id, key.clone(), NaiveDate::MAX);
        self.markers
            .range(lower..=upper)
            .map(|(_, marker)| marker)
            .collect()
    }

    pub fn origin(&self, business_id: Uuid, key: &AccountKey) -> Option<&LedgerMarker> {
        self.markers(business_id, key).into_iter().next()
    }

    pub fn tail(&self, business_id: Uuid, key: &AccountKey) -> Option<&LedgerMarker> {
        let lower = (business_id, key.clone(), NaiveDate::MIN);
        let upper = (business_id, key.clone(), NaiveDate::MAX);
        self.markers
            .range(lower..=upper)
            .next_back()
            .map(|(_, marker)| marker)
    }

    /// Latest settled marker whose `dt_stop` is on or before `date`.
    pub fn baseline(
        &self,
        business_id: Uuid,
        key: &AccountKey,
        date: NaiveDate,
    ) -> Option<&LedgerMarker> {
        let lower = (business_id, key.clone(), NaiveDate::MIN);
        let upper = (business_id, key.clone(), date);
        self.markers
            .range(lower..=upper)
            .rev()
            .map(|(_, marker)| marker)
            .find(|marker| marker.state.is_settled())
    }

    /// The non-origin marker whose range contains `date`.
    pub fn marker_covering(
        &self,
        business_id: Uuid,
        key: &AccountKey,
        date: NaiveDate,
    ) -> Option<&LedgerMarker> {
        let lower = (business_id, key.clone(), date.succ_opt().unwrap_or(date));
        let upper = (business_id, key.clone(), NaiveDate::MAX);
        self.markers
            .range(lower..=upper)
            .map(|(_, marker)| marker)
            .next()
            .filter(|marker| marker.covers(date))
    }

    pub fn insert_marker(&mut self, marker: LedgerMarker) -> Result<()> {
        let index = (marker.business_id, marker.key.clone(), marker.dt_stop);
        if self.markers.contains_key(&index) {
            return Err(LedgerError::integrity(format!(
                "{} already has a marker ending {}",
                marker.key, marker.dt_stop
            )));
        }
        self.markers.insert(index, marker);
        Ok(())
    }

    /// Replaces the marker stored under the same `(business, key, dt_stop)`.
    pub fn update_marker(&mut self, marker: LedgerMarker) -> Result<()> {
        let index = (marker.business_id, marker.key.clone(), marker.dt_stop);
        match self.markers.get_mut(&index) {
            Some(slot) if slot.id == marker.id => {
                *slot = marker;
                Ok(())
            }
            _ => Err(LedgerError::not_found(format!(
                "marker {} for {} ending {}",
                marker.id, marker.key, marker.dt_stop
            ))),
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    // -- journal markers ----------------------------------------------------------

    pub fn journal_markers(&self, business_id: Uuid) -> Vec<&JournalMarker> {
        self.journal_markers
            .range((business_id, NaiveDate::MIN)..=(business_id, NaiveDate::MAX))
            .map(|(_, marker)| marker)
            .collect()
    }

    pub fn journal_marker_covering(
        &self,
        business_id: Uuid,
        date: NaiveDate,
    ) -> Option<&JournalMarker> {
        let after = date.succ_opt().unwrap_or(date);
        self.journal_markers
            .range((business_id, after)..=(business_id, NaiveDate::MAX))
            .map(|(_, marker)| marker)
            .find(|marker| marker.covers(date))
    }

    pub fn upsert_journal_marker(&mut self, marker: JournalMarker) -> Result<()> {
        let overlapping = self
            .journal_markers(marker.business_id)
            .into_iter()
            .any(|other| {
                other.id != marker.id
                    && other.dt_start < marker.dt_stop
                    && marker.dt_start < other.dt_stop
            });
        if overlapping {
            return Err(LedgerError::integrity(format!(
                "journal period [{}, {}) overlaps an existing period",
                marker.dt_start, marker.dt_stop
            )));
        }
        self.journal_markers
            .insert((marker.business_id, marker.dt_stop), marker);
        Ok(())
    }

    // -- integrity ----------------------------------------------------------------

    /// Checks the structural invariants a commit must never break: marker chains are
    /// ordered and disjoint, settled balances reconcile with the rows behind them, and
    /// every ledger row traces to a journal allocation.
    pub fn verify(&self, epsilon: f64) -> Result<()> {
        let timelines: BTreeSet<(Uuid, &AccountKey)> = self
            .markers
            .keys()
            .map(|(business, key, _)| (*business, key))
            .collect();
        for (business, key) in timelines {
            self.verify_chain(business, key, epsilon)?;
        }

        for entry in self.entries.values() {
            let journal = self.journals.get(&entry.journal_id).ok_or_else(|| {
                LedgerError::integrity(format!(
                    "ledger row {} references missing journal {}",
                    entry.id, entry.journal_id
                ))
            })?;
            if !journal
                .allocations
                .iter()
                .any(|alloc| alloc.id == entry.allocation_id)
            {
                return Err(LedgerError::integrity(format!(
                    "ledger row {} references missing allocation {}",
                    entry.id, entry.allocation_id
                )));
            }
        }
        Ok(())
    }

    /// Checks one key's marker chain: a single origin first, contiguous links, every
    /// settled balance equal to the previous settled balance plus the rows between them,
    /// and no rows dated before the origin.
    pub fn verify_chain(&self, business_id: Uuid, key: &AccountKey, epsilon: f64) -> Result<()> {
        let chain = self.markers(business_id, key);
        let Some((&origin, rest)) = chain.split_first() else {
            return Ok(());
        };
        if origin.state != MarkerState::Origin {
            return Err(LedgerError::integrity(format!(
                "{} marker chain does not begin with an origin",
                key
            )));
        }
        let mut prev = origin;
        let mut settled = origin;
        for &marker in rest {
            if marker.state == MarkerState::Origin {
                return Err(LedgerError::integrity(format!(
                    "{} has more than one origin marker",
                    key
                )));
            }
            if marker.dt_start != prev.dt_stop || marker.dt_stop <= marker.dt_start {
                return Err(LedgerError::integrity(format!(
                    "{} marker [{}, {}) does not follow [{}, {})",
                    key, marker.dt_start, marker.dt_stop, prev.dt_start, prev.dt_stop
                )));
            }
            if prev.next != Some(marker.id) {
                return Err(LedgerError::integrity(format!(
                    "{} marker {} is not linked to its successor",
                    key, prev.id
                )));
            }
            if marker.state.is_settled() {
                let expected = settled.balance
                    + self.sum_entries(business_id, key, settled.dt_stop, marker.dt_stop);
                if !amounts_match(expected, marker.balance, epsilon) {
                    return Err(LedgerError::integrity(format!(
                        "{} marker ending {} holds {:.2} but its rows total {:.2}",
                        key, marker.dt_stop, marker.balance, expected
                    )));
                }
                settled = marker;
            }
            prev = marker;
        }
        if self
            .entries(business_id, key, NaiveDate::MIN, origin.dt_stop)
            .next()
            .is_some()
        {
            return Err(LedgerError::integrity(format!(
                "{} has ledger rows dated before its origin {}",
                key, origin.dt_stop
            )));
        }
        Ok(())
    }

    // -- snapshots ----------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
    }


    pub fn to_snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            schema_version: BOOK_SCHEMA_VERSION,
            assessments: self.assessments.values().cloned().collect(),
            receipts: self.receipts.values().cloned().collect(),
            journals: self.journals.values().cloned().collect(),
            ledger: self.entries.values().cloned().collect(),
            markers: self.markers.values().cloned().collect(),
            journal_markers: self.journal_markers.values().cloned().collect(),
            next_seq: self.next_seq,
            generation: self.generation,
        }
    }

    pub fn from_snapshot(snapshot: BookSnapshot) -> Result<Self> {
        if snapshot.schema_version > BOOK_SCHEMA_VERSION {
            return Err(LedgerError::Storage(format!(
                "book schema version {} is newer than supported version {}",
                snapshot.schema_version, BOOK_SCHEMA_VERSION
            )));
        }
        let mut book = Book::new();
        for asmt in snapshot.assessments {
            book.assessments.insert(asmt.id, asmt);
        }
        for rcpt in snapshot.receipts {
            book.receipts.insert(rcpt.id, rcpt);
        }
        for jnl in snapshot.journals {
            book.posted.insert(jnl.posting_key(), jnl.id);
            book.journals.insert(jnl.id, jnl);
        }
        for entry in snapshot.ledger {
            book.next_seq = book.next_seq.max(entry.seq);
            book.written.insert(entry.journal_id);
            let index = (entry.business_id, entry.key.clone(), entry.date, entry.seq);
            book.entries.insert(index, entry);
        }
        book.next_seq = book.next_seq.max(snapshot.next_seq);
        book.generation = snapshot.generation;
        for marker in snapshot.markers {
            book.insert_marker(marker)?;
        }
        for marker in snapshot.journal_markers {
            book.upsert_journal_marker(marker)?;
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryKind, Frequency, JournalSource, ReceiptAllocation};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rent(biz: Uuid) -> Assessment {
        Assessment::new(
            biz,
            Uuid::new_v4(),
            "Rent",
            800.0,
            date(2015, 1, 1),
            date(2016, 1, 1),
            Frequency::Monthly,
            "d 11000 _, c 41000 _",
        )
    }

    fn posted_journal(asmt: &Assessment) -> Journal {
        let mut jnl = Journal::new(
            asmt.business_id,
            None,
            date(2015, 1, 1),
            asmt.amount,
            JournalSource::Assessment {
                assessment_id: asmt.id,
            },
        );
        jnl.push_allocation(asmt.rentable_id, asmt.id, asmt.amount, asmt.posting_rule.clone());
        jnl
    }

    #[test]
    fn posted_assessments_are_frozen() {
        let mut book = Book::new();
        let asmt = rent(Uuid::new_v4());
        book.insert_assessment(asmt.clone()).unwrap();

        let mut edited = asmt.clone();
        edited.amount = 850.0;
        book.update_assessment(edited.clone()).unwrap();

        book.insert_journal(posted_journal(&asmt), 0.005).unwrap();
        book.update_assessment(edited.clone()).unwrap();
        edited.amount = 900.0;
        assert!(matches!(
            book.update_assessment(edited),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(book.assessment(asmt.id).unwrap().amount, 850.0);
    }

    #[test]
    fn duplicate_posting_key_is_an_integrity_error() {
        let mut book = Book::new();
        let asmt = rent(Uuid::new_v4());
        book.insert_journal(posted_journal(&asmt), 0.005).unwrap();
        assert!(matches!(
            book.insert_journal(posted_journal(&asmt), 0.005),
            Err(LedgerError::Integrity(_))
        ));
    }

    #[test]
    fn receipts_must_allocate_their_full_amount() {
        let mut book = Book::new();
        let biz = Uuid::new_v4();
        let short = Receipt::new(biz, date(2015, 1, 5), 800.0, "d 10100 _, c 11000 _")
            .allocate(ReceiptAllocation::new(Uuid::new_v4(), 700.0));
        assert!(matches!(
            book.insert_receipt(short, 0.005),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn verify_rejects_rows_without_journal() {
        let mut book = Book::new();
        let biz = Uuid::new_v4();
        book.append_entry(LedgerEntry::new(
            biz,
            Uuid::new_v4(),
            Uuid::new_v4(),
            AccountKey::gl("11000"),
            date(2015, 1, 1),
            800.0,
            EntryKind::Assessment,
            Uuid::new_v4(),
        ));
        assert!(matches!(book.verify(0.005), Err(LedgerError::Integrity(_))));
    }

    #[test]
    fn verify_rejects_unreconciled_settled_marker() {
        let mut book = Book::new();
        let biz = Uuid::new_v4();
        let key = AccountKey::gl("11000");
        let mut origin = LedgerMarker::origin(biz, key.clone(), date(2015, 1, 1), 100.0);
        let closed = LedgerMarker {
            id: Uuid::new_v4(),
            business_id: biz,
            key: key.clone(),
            state: MarkerState::Closed,
            dt_start: date(2015, 1, 1),
            dt_stop: date(2015, 2, 1),
            balance: 250.0,
            next: None,
        };
        origin.next = Some(closed.id);
        book.insert_marker(origin).unwrap();
        book.insert_marker(closed).unwrap();
        assert!(matches!(book.verify(0.005), Err(LedgerError::Integrity(_))));
    }

    #[test]
    fn snapshot_restores_sequence_and_indices() {
        let mut book = Book::new();
        let asmt = rent(Uuid::new_v4());
        let jnl = posted_journal(&asmt);
        let alloc = jnl.allocations[0].id;
        let jnl_id = jnl.id;
        book.insert_journal(jnl, 0.005).unwrap();
        book.append_entry(LedgerEntry::new(
            asmt.business_id,
            jnl_id,
            alloc,
            AccountKey::gl("11000"),
            date(2015, 1, 1),
            800.0,
            EntryKind::Assessment,
            asmt.rentable_id,
        ));

        let mut restored = Book::from_snapshot(book.to_snapshot()).unwrap();
        assert!(restored.is_written(jnl_id));
        assert!(restored.has_journals_for(asmt.id));
        let next = restored.append_entry(LedgerEntry::new(
            asmt.business_id,
            jnl_id,
            alloc,
            AccountKey::gl("41000"),
            date(2015, 1, 1),
            -800.0,
            EntryKind::Assessment,
            asmt.rentable_id,
        ));
        assert_eq!(next, 2);
        restored.verify(0.005).unwrap();
    }

    #[test]
    fn snapshot_carries_generation() {
        let mut book = Book::new();
        book.advance_generation();
        book.advance_generation();
        let restored = Book::from_snapshot(book.to_snapshot()).unwrap();
        assert_eq!(restored.generation(), 2);

        let legacy: BookSnapshot = serde_json::from_str(r#"{"schema_version": 1}"#).unwrap();
        assert_eq!(legacy.generation, 0);
    }

    #[test]
    fn verify_reconciles_each_settled_marker_against_its_predecessor() {
        let mut book = Book::new();
        let biz = Uuid::new_v4();
        let key = AccountKey::gl("11000");
        let mut origin = LedgerMarker::origin(biz, key.clone(), date(2015, 1, 1), 100.0);
        let mut january = LedgerMarker {
            id: Uuid::new_v4(),
            business_id: biz,
            key: key.clone(),
            state: MarkerState::Closed,
            dt_start: date(2015, 1, 1),
            dt_stop: date(2015, 2, 1),
            balance: 100.0,
            next: None,
        };
        let february = LedgerMarker {
            id: Uuid::new_v4(),
            dt_start: date(2015, 2, 1),
            dt_stop: date(2015, 3, 1),
            balance: 100.0,
            ..january.clone()
        };
        origin.next = Some(january.id);
        january.next = Some(february.id);
        book.insert_marker(origin).unwrap();
        book.insert_marker(january.clone()).unwrap();
        book.insert_marker(february.clone()).unwrap();
        book.verify(0.005).unwrap();
        book.verify_chain(biz, &key, 0.005).unwrap();

        book.update_marker(LedgerMarker {
            balance: 40.0,
            ..february
        })
        .unwrap();
        let err = book.verify_chain(biz, &key, 0.005).unwrap_err();
        assert!(err.to_string().contains("2015-03-01"));
    }
}
