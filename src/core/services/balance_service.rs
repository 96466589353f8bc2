//! Point balances and range statements answered from the nearest settled marker.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    AccountKey, DateWindow, LedgerEntry, LedgerLine, LedgerMarker, Statement, StatementEntry,
};
use crate::errors::{LedgerError, Result};
use crate::storage::Book;

/// Read-only queries. Nothing here writes, so any snapshot may be queried concurrently.
pub struct BalanceService;

impl BalanceService {
    /// Balance of `key` from every row dated before `date`.
    pub fn balance(
        book: &Book,
        business_id: Uuid,
        key: &AccountKey,
        date: NaiveDate,
        staleness_warn_days: i64,
    ) -> Result<f64> {
        let marker = baseline(book, business_id, key, date)?;
        let gap: Vec<&LedgerEntry> = book
            .entries(business_id, key, marker.dt_stop, date)
            .collect();
        report_gap(key, marker, date, gap.len(), staleness_warn_days);
        Ok(marker.balance + gap.iter().map(|entry| entry.amount).sum::<f64>())
    }

    /// Activity of `key` over `[start, end)` with opening and closing balances.
    pub fn statement(
        book: &Book,
        business_id: Uuid,
        key: &AccountKey,
        start: NaiveDate,
        end: NaiveDate,
        staleness_warn_days: i64,
    ) -> Result<Statement> {
        let window = DateWindow::new(start, end)?;
        let lm_start = baseline(book, business_id, key, window.start)?;
        let gap = ordered(book.entries(business_id, key, lm_start.dt_stop, window.start));
        report_gap(key, lm_start, window.start, gap.len(), staleness_warn_days);
        let entries = ordered(book.entries(business_id, key, window.start, window.end));

        let opening = lm_start.balance + gap.iter().map(|entry| entry.amount).sum::<f64>();
        let closing = opening + entries.iter().map(|entry| entry.amount).sum::<f64>();
        Ok(Statement {
            key: key.clone(),
            start: window.start,
            end: window.end,
            lm_start: lm_start.clone(),
            gap,
            opening,
            entries,
            closing,
        })
    }

    /// Rows of `key` over `[start, end)`, each with the running balance after it.
    pub fn ledger_lines(
        book: &Book,
        business_id: Uuid,
        key: &AccountKey,
        start: NaiveDate,
        end: NaiveDate,
        staleness_warn_days: i64,
    ) -> Result<Vec<LedgerLine>> {
        let stmt = Self::statement(book, business_id, key, start, end, staleness_warn_days)?;
        let mut balance = stmt.opening;
        Ok(stmt
            .entries
            .into_iter()
            .map(|entry| {
                balance += entry.amount;
                LedgerLine { entry, balance }
            })
            .collect())
    }
}

fn baseline<'a>(
    book: &'a Book,
    business_id: Uuid,
    key: &AccountKey,
    date: NaiveDate,
) -> Result<&'a LedgerMarker> {
    book.baseline(business_id, key, date).ok_or_else(|| {
        LedgerError::not_found(format!("no settled marker for {} on or before {}", key, date))
    })
}

/// Date order; same-day assessments before receipts, then insertion order.
fn ordered<'a>(rows: impl Iterator<Item = &'a LedgerEntry>) -> Vec<StatementEntry> {
    let mut rows: Vec<&LedgerEntry> = rows.collect();
    rows.sort_by_key(|entry| (entry.date, entry.kind.rank(), entry.seq));
    rows.into_iter().map(StatementEntry::from).collect()
}

fn report_gap(
    key: &AccountKey,
    marker: &LedgerMarker,
    until: NaiveDate,
    rows: usize,
    staleness_warn_days: i64,
) {
    if rows == 0 {
        return;
    }
    let days = (until - marker.dt_stop).num_days();
    if days > staleness_warn_days {
        tracing::warn!(
            key = %key,
            marker_stop = %marker.dt_stop,
            until = %until,
            days,
            rows,
            "stale checkpoint: summing activity since last settled marker"
        );
    } else {
        tracing::debug!(key = %key, marker_stop = %marker.dt_stop, days, rows, "checkpoint gap");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::MarkerService;
    use crate::domain::EntryKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(biz: Uuid, key: &AccountKey, on: NaiveDate, amount: f64, kind: EntryKind) -> LedgerEntry {
        LedgerEntry::new(
            biz,
            Uuid::new_v4(),
            Uuid::new_v4(),
            key.clone(),
            on,
            amount,
            kind,
            Uuid::new_v4(),
        )
    }

    #[test]
    fn balance_is_marker_plus_gap() {
        let mut book = Book::new();
        let biz = Uuid::new_v4();
        let key = AccountKey::gl("11000");
        MarkerService::create_origin(&mut book, biz, &key, date(2015, 1, 1), 500.0).unwrap();
        book.append_entry(row(biz, &key, date(2015, 1, 3), 20.0, EntryKind::Assessment));
        book.append_entry(row(biz, &key, date(2015, 1, 9), 30.0, EntryKind::Assessment));

        assert_eq!(
            BalanceService::balance(&book, biz, &key, date(2015, 1, 9), 31).unwrap(),
            520.0
        );
        assert_eq!(
            BalanceService::balance(&book, biz, &key, date(2015, 1, 10), 31).unwrap(),
            550.0
        );
    }

    #[test]
    fn same_day_receipts_follow_assessments() {
        let mut book = Book::new();
        let biz = Uuid::new_v4();
        let key = AccountKey::RentalAgreement(Uuid::new_v4());
        MarkerService::create_origin(&mut book, biz, &key, date(2015, 1, 1), 0.0).unwrap();
        book.append_entry(row(biz, &key, date(2015, 1, 5), 100.0, EntryKind::Receipt));
        book.append_entry(row(biz, &key, date(2015, 1, 5), -100.0, EntryKind::Assessment));

        let lines =
            BalanceService::ledger_lines(&book, biz, &key, date(2015, 1, 1), date(2015, 2, 1), 31)
                .unwrap();
        assert_eq!(lines[0].entry.kind, EntryKind::Assessment);
        assert_eq!(lines[0].balance, -100.0);
        assert_eq!(lines[1].balance, 0.0);
    }

    #[test]
    fn query_before_any_marker_is_not_found() {
        let book = Book::new();
        let err = BalanceService::balance(&book, Uuid::new_v4(), &AccountKey::gl("1"), date(2015, 1, 1), 31)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(ref msg) if msg.contains("2015-01-01")));
    }
}
