//! Appends ledger rows for posted journals.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core::context::BusinessContext;
use crate::core::services::{MarkerService, RecordOutcome};
use crate::domain::{
    amounts_match, round_cents, AccountKey, DateWindow, EntryKind, Journal, LedgerEntry,
};
use crate::errors::{LedgerError, Result};
use crate::storage::Book;

pub struct LedgerWriter;

impl LedgerWriter {
    /// Writes rows for every journal of the business dated in `window` that has none yet.
    pub fn write_window(
        book: &mut Book,
        ctx: &BusinessContext,
        window: DateWindow,
        override_closed: bool,
    ) -> Result<Vec<RecordOutcome>> {
        let pending: Vec<(Uuid, NaiveDate)> = book
            .journals_in(ctx.business_id(), window.start, window.end)
            .into_iter()
            .map(|jnl| (jnl.id, jnl.date))
            .collect();
        let mut outcomes = Vec::with_capacity(pending.len());
        for (journal_id, date) in pending {
            let subject = format!("journal {} on {}", journal_id, date);
            if book.is_written(journal_id) {
                outcomes.push(RecordOutcome::skipped(subject, "already written"));
                continue;
            }
            match Self::write_journal(book, ctx, journal_id, override_closed) {
                Ok(rows) => {
                    tracing::debug!(journal = %journal_id, rows, "ledger rows written");
                    outcomes.push(RecordOutcome::succeeded(subject));
                }
                Err(err) => outcomes.push(RecordOutcome::from_error(subject, err)?),
            }
        }
        Ok(outcomes)
    }

    /// Appends all rows of one journal, or none of them.
    ///
    /// Rows may only land in open or not-yet-checkpointed periods. With
    /// `override_closed`, closed (never locked) periods are accepted too and the
    /// balances of the affected markers are re-derived.
    pub fn write_journal(
        book: &mut Book,
        ctx: &BusinessContext,
        journal_id: Uuid,
        override_closed: bool,
    ) -> Result<usize> {
        if book.is_written(journal_id) {
            return Ok(0);
        }
        let journal = book
            .journal(journal_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("journal {}", journal_id)))?;
        let rows = Self::rows_for(ctx, &journal)?;

        let keys: BTreeSet<AccountKey> = rows.iter().map(|row| row.key.clone()).collect();
        let mut overridden = Vec::new();
        for key in &keys {
            if let Some(stop) = MarkerService::check_writable(
                book,
                journal.business_id,
                key,
                journal.date,
                override_closed,
            )? {
                overridden.push((key.clone(), stop));
            }
        }

        let count = rows.len();
        for row in rows {
            book.append_entry(row);
        }
        for (key, stop) in overridden {
            tracing::warn!(
                key = %key,
                journal = %journal.id,
                "posting into a closed period by override"
            );
            MarkerService::rebalance_from(book, journal.business_id, &key, stop)?;
        }
        Ok(count)
    }

    /// Ledger rows for a journal: legs of each allocation's rule merged per GL account,
    /// plus a rental-agreement row per allocation when the journal has an agreement.
    pub fn rows_for(ctx: &BusinessContext, journal: &Journal) -> Result<Vec<LedgerEntry>> {
        journal.verify_allocations(ctx.epsilon())?;
        let kind = journal.kind();
        let mut rows = Vec::new();
        let mut net = 0.0;
        for alloc in &journal.allocations {
            let mut per_account: BTreeMap<String, f64> = BTreeMap::new();
            for leg in ctx.resolve_rule(&alloc.posting_rule, alloc.amount)? {
                *per_account.entry(leg.gl_number.clone()).or_default() += leg.signed_amount();
            }
            for (gl_number, amount) in per_account {
                let amount = round_cents(amount);
                if amount == 0.0 {
                    continue;
                }
                net += amount;
                rows.push(LedgerEntry::new(
                    journal.business_id,
                    journal.id,
                    alloc.id,
                    AccountKey::Gl(gl_number),
                    journal.date,
                    amount,
                    kind,
                    alloc.rentable_id,
                ));
            }
            if let Some(ra) = journal.rental_agreement_id {
                let amount = match kind {
                    EntryKind::Assessment => -alloc.amount,
                    EntryKind::Receipt => alloc.amount,
                };
                rows.push(LedgerEntry::new(
                    journal.business_id,
                    journal.id,
                    alloc.id,
                    AccountKey::RentalAgreement(ra),
                    journal.date,
                    amount,
                    kind,
                    alloc.rentable_id,
                ));
            }
        }
        if !amounts_match(net, 0.0, ctx.epsilon()) {
            return Err(LedgerError::integrity(format!(
                "journal {} general-ledger rows net to {:.2} instead of zero",
                journal.id, net
            )));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::context::StaticMasterData;
    use crate::domain::{Business, GlAccount, JournalSource, Rentable};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn context() -> BusinessContext {
        let biz = Business::new("REX", "Rexford");
        let data = StaticMasterData::new()
            .with_account(GlAccount::new(biz.id, "11000", "Receivable"))
            .with_account(GlAccount::new(biz.id, "41000", "Rent"))
            .with_account(GlAccount::new(biz.id, "41100", "Fees"))
            .with_rentable(Rentable::new(biz.id, "Unit 7"))
            .with_business(biz.clone());
        BusinessContext::load(Arc::new(data), biz.id, &Config::default()).unwrap()
    }

    fn journal(ctx: &BusinessContext, ra: Option<Uuid>, rule: &str) -> Journal {
        let asmt = Uuid::new_v4();
        let mut jnl = Journal::new(
            ctx.business_id(),
            ra,
            date(2015, 3, 1),
            1200.0,
            JournalSource::Assessment { assessment_id: asmt },
        );
        jnl.push_allocation(Uuid::new_v4(), asmt, 1200.0, rule);
        jnl
    }

    #[test]
    fn rows_are_double_entry_with_agreement_view() {
        let ctx = context();
        let ra = Uuid::new_v4();
        let jnl = journal(&ctx, Some(ra), "d 11000 _, c 41000 75%, c 41100 _");
        let rows = LedgerWriter::rows_for(&ctx, &jnl).unwrap();
        assert_eq!(rows.len(), 4);
        let gl_net: f64 = rows
            .iter()
            .filter(|row| !row.key.is_rental_agreement())
            .map(|row| row.amount)
            .sum();
        assert!(gl_net.abs() < 0.005);
        let ra_row = rows
            .iter()
            .find(|row| row.key == AccountKey::RentalAgreement(ra))
            .unwrap();
        assert_eq!(ra_row.amount, -1200.0);
    }

    #[test]
    fn legs_on_one_account_merge_into_one_row() {
        let ctx = context();
        let jnl = journal(&ctx, None, "d 11000 _, c 41000 50%, c 41000 _");
        let rows = LedgerWriter::rows_for(&ctx, &jnl).unwrap();
        assert_eq!(rows.len(), 2);
        let rent = rows
            .iter()
            .find(|row| row.key == AccountKey::gl("41000"))
            .unwrap();
        assert_eq!(rent.amount, -1200.0);
    }

    #[test]
    fn writing_a_journal_is_idempotent() {
        let ctx = context();
        let mut book = Book::new();
        let jnl = journal(&ctx, None, "d 11000 _, c 41000 _");
        let id = jnl.id;
        book.insert_journal(jnl, ctx.epsilon()).unwrap();
        assert_eq!(LedgerWriter::write_journal(&mut book, &ctx, id, false).unwrap(), 2);
        assert_eq!(LedgerWriter::write_journal(&mut book, &ctx, id, false).unwrap(), 0);
        assert_eq!(book.entry_count(), 2);
    }

    #[test]
    fn closed_period_rejects_then_accepts_with_override() {
        let ctx = context();
        let mut book = Book::new();
        let key = AccountKey::gl("11000");
        let biz = ctx.business_id();
        for gl in ["11000", "41000"] {
            MarkerService::create_origin(&mut book, biz, &AccountKey::gl(gl), date(2015, 1, 1), 0.0)
                .unwrap();
            MarkerService::close_period(&mut book, biz, &AccountKey::gl(gl), date(2015, 4, 1))
                .unwrap();
        }
        let jnl = journal(&ctx, None, "d 11000 _, c 41000 _");
        let id = jnl.id;
        book.insert_journal(jnl, ctx.epsilon()).unwrap();

        assert!(matches!(
            LedgerWriter::write_journal(&mut book, &ctx, id, false),
            Err(LedgerError::Concurrency(_))
        ));
        assert_eq!(book.entry_count(), 0);

        LedgerWriter::write_journal(&mut book, &ctx, id, true).unwrap();
        let tail = book.tail(biz, &key).unwrap();
        assert_eq!(tail.balance, 1200.0);
        book.verify(ctx.epsilon()).unwrap();
    }
}
