//! Checkpoint lifecycle for account timelines and journal periods.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core::services::RecordOutcome;
use crate::domain::{AccountKey, DateWindow, JournalMarker, LedgerMarker, MarkerState};
use crate::errors::{LedgerError, Result};
use crate::storage::Book;

pub struct MarkerService;

impl MarkerService {
    /// Seeds a key's marker chain with its opening balance as of `date`.
    pub fn create_origin(
        book: &mut Book,
        business_id: Uuid,
        key: &AccountKey,
        date: NaiveDate,
        balance: f64,
    ) -> Result<LedgerMarker> {
        if book.tail(business_id, key).is_some() {
            return Err(LedgerError::integrity(format!(
                "{} already has an origin marker",
                key
            )));
        }
        if let Some(early) = book.entries(business_id, key, NaiveDate::MIN, date).next() {
            return Err(LedgerError::integrity(format!(
                "{} has a ledger row on {} before the requested origin {}",
                key, early.date, date
            )));
        }
        let origin = LedgerMarker::origin(business_id, key.clone(), date, balance);
        book.insert_marker(origin.clone())?;
        tracing::debug!(key = %key, date = %date, balance, "origin marker created");
        Ok(origin)
    }

    /// Opens `[tail.dt_stop, stop)` for postings.
    pub fn open_period(
        book: &mut Book,
        business_id: Uuid,
        key: &AccountKey,
        stop: NaiveDate,
    ) -> Result<LedgerMarker> {
        let tail = require_tail(book, business_id, key)?;
        if !tail.state.is_settled() {
            return Err(LedgerError::concurrency(format!(
                "{} already has an open period [{}, {})",
                key, tail.dt_start, tail.dt_stop
            )));
        }
        if stop <= tail.dt_stop {
            return Err(LedgerError::validation(format!(
                "{} period stop {} must be after {}",
                key, stop, tail.dt_stop
            )));
        }
        let marker = LedgerMarker {
            id: Uuid::new_v4(),
            business_id,
            key: key.clone(),
            state: MarkerState::Open,
            dt_start: tail.dt_stop,
            dt_stop: stop,
            balance: tail.balance,
            next: None,
        };
        link(book, tail, &marker)?;
        tracing::debug!(key = %key, start = %marker.dt_start, stop = %stop, "period opened");
        Ok(marker)
    }

    /// Closes the key's timeline through `boundary` (exclusive).
    ///
    /// An open tail ending at `boundary` is finalized; otherwise a new closed marker
    /// covers `[tail.dt_stop, boundary)`. Returns `None` when the timeline is already
    /// settled through `boundary`.
    pub fn close_period(
        book: &mut Book,
        business_id: Uuid,
        key: &AccountKey,
        boundary: NaiveDate,
    ) -> Result<Option<LedgerMarker>> {
        let mut tail = require_tail(book, business_id, key)?;

        if tail.state == MarkerState::Open {
            if boundary < tail.dt_stop {
                if boundary <= tail.dt_start {
                    return Ok(None);
                }
                return Err(LedgerError::validation(format!(
                    "{} boundary {} falls inside the open period [{}, {})",
                    key, boundary, tail.dt_start, tail.dt_stop
                )));
            }
            tail.balance = settled_balance(book, &tail)?;
            tail.state = MarkerState::Closed;
            book.update_marker(tail.clone())?;
            tracing::debug!(key = %key, stop = %tail.dt_stop, balance = tail.balance, "period closed");
            if boundary == tail.dt_stop {
                return Ok(Some(tail));
            }
        } else if boundary <= tail.dt_stop {
            return Ok(None);
        }

        let balance = tail.balance + book.sum_entries(business_id, key, tail.dt_stop, boundary);
        let marker = LedgerMarker {
            id: Uuid::new_v4(),
            business_id,
            key: key.clone(),
            state: MarkerState::Closed,
            dt_start: tail.dt_stop,
            dt_stop: boundary,
            balance,
            next: None,
        };
        link(book, tail, &marker)?;
        tracing::debug!(
            key = %key,
            start = %marker.dt_start,
            stop = %boundary,
            balance,
            "period closed"
        );
        Ok(Some(marker))
    }

    /// Closes every key of the business through `window.end`.
    ///
    /// Keys without an origin get a zero origin at the earlier of `window.start` and their
    /// first row when `auto_origin` is set, and are reported as failures otherwise.
    pub fn close_all(
        book: &mut Book,
        business_id: Uuid,
        window: DateWindow,
        auto_origin: bool,
    ) -> Result<Vec<RecordOutcome>> {
        let mut outcomes = Vec::new();
        for key in book.account_keys(business_id) {
            let subject = format!("{} through {}", key, window.end);
            if book.origin(business_id, &key).is_none() {
                if !auto_origin {
                    outcomes.push(RecordOutcome::from_error(
                        subject,
                        LedgerError::not_found(format!("origin marker for {}", key)),
                    )?);
                    continue;
                }
                let first_row = book
                    .entries(business_id, &key, NaiveDate::MIN, NaiveDate::MAX)
                    .next()
                    .map(|entry| entry.date);
                let start = first_row.map_or(window.start, |first| first.min(window.start));
                Self::create_origin(book, business_id, &key, start, 0.0)?;
            }
            match Self::close_period(book, business_id, &key, window.end) {
                Ok(Some(_)) => outcomes.push(RecordOutcome::succeeded(subject)),
                Ok(None) => outcomes.push(RecordOutcome::skipped(subject, "already closed")),
                Err(err) => outcomes.push(RecordOutcome::from_error(subject, err)?),
            }
        }
        Ok(outcomes)
    }

    /// Locks every closed marker of the key ending on or before `date`.
    pub fn lock_through(
        book: &mut Book,
        business_id: Uuid,
        key: &AccountKey,
        date: NaiveDate,
    ) -> Result<usize> {
        let targets: Vec<LedgerMarker> = book
            .markers(business_id, key)
            .into_iter()
            .filter(|marker| marker.dt_stop <= date && marker.state != MarkerState::Origin)
            .cloned()
            .collect();
        if let Some(open) = targets.iter().find(|m| m.state == MarkerState::Open) {
            return Err(LedgerError::validation(format!(
                "{} period [{}, {}) must be closed before it can be locked",
                key, open.dt_start, open.dt_stop
            )));
        }
        let mut locked = 0;
        for mut marker in targets {
            if marker.state == MarkerState::Closed {
                marker.state = MarkerState::Locked;
                book.update_marker(marker)?;
                locked += 1;
            }
        }
        tracing::debug!(key = %key, through = %date, locked, "periods locked");
        Ok(locked)
    }

    /// Returns the most recent closed period of the key to `Open`.
    pub fn reopen(book: &mut Book, business_id: Uuid, key: &AccountKey) -> Result<LedgerMarker> {
        let mut tail = require_tail(book, business_id, key)?;
        match tail.state {
            MarkerState::Closed => {
                tail.state = MarkerState::Open;
                book.update_marker(tail.clone())?;
                tracing::debug!(key = %key, stop = %tail.dt_stop, "period reopened");
                Ok(tail)
            }
            MarkerState::Locked => Err(LedgerError::concurrency(format!(
                "{} period ending {} is locked",
                key, tail.dt_stop
            ))),
            MarkerState::Open => Err(LedgerError::validation(format!(
                "{} period ending {} is already open",
                key, tail.dt_stop
            ))),
            MarkerState::Origin => Err(LedgerError::validation(format!(
                "{} has no closed period to reopen",
                key
            ))),
        }
    }

    /// Checks that the key's markers are ordered, contiguous, correctly linked and that
    /// every settled balance reconciles with the rows behind it.
    pub fn verify_chain(
        book: &Book,
        business_id: Uuid,
        key: &AccountKey,
        epsilon: f64,
    ) -> Result<()> {
        book.verify_chain(business_id, key, epsilon)
    }

    /// Decides whether a row for `key` dated `date` may be appended.
    ///
    /// Returns the `dt_stop` of the closed marker being overridden, if any, so the caller
    /// can re-derive balances from there.
    pub fn check_writable(
        book: &Book,
        business_id: Uuid,
        key: &AccountKey,
        date: NaiveDate,
        override_closed: bool,
    ) -> Result<Option<NaiveDate>> {
        if let Some(origin) = book.origin(business_id, key) {
            if date < origin.dt_stop {
                return Err(LedgerError::concurrency(format!(
                    "{} row on {} precedes the origin {}",
                    key, date, origin.dt_stop
                )));
            }
        }
        let Some(covering) = book.marker_covering(business_id, key, date) else {
            return Ok(None);
        };
        match covering.state {
            MarkerState::Open | MarkerState::Origin => Ok(None),
            MarkerState::Locked => Err(LedgerError::concurrency(format!(
                "{} period [{}, {}) is locked",
                key, covering.dt_start, covering.dt_stop
            ))),
            MarkerState::Closed if !override_closed => Err(LedgerError::concurrency(format!(
                "{} period [{}, {}) is closed",
                key, covering.dt_start, covering.dt_stop
            ))),
            MarkerState::Closed => {
                let locked_after = book
                    .markers(business_id, key)
                    .into_iter()
                    .any(|m| m.dt_stop > covering.dt_stop && m.state == MarkerState::Locked);
                if locked_after {
                    return Err(LedgerError::concurrency(format!(
                        "{} has locked periods after {}",
                        key, covering.dt_stop
                    )));
                }
                Ok(Some(covering.dt_stop))
            }
        }
    }

    /// Re-derives the balance of every marker of the key ending on or after `from_stop`.
    pub fn rebalance_from(
        book: &mut Book,
        business_id: Uuid,
        key: &AccountKey,
        from_stop: NaiveDate,
    ) -> Result<usize> {
        let Some(origin) = book.origin(business_id, key).cloned() else {
            return Ok(0);
        };
        let affected: Vec<LedgerMarker> = book
            .markers(business_id, key)
            .into_iter()
            .filter(|m| m.state != MarkerState::Origin && m.dt_stop >= from_stop)
            .cloned()
            .collect();
        let count = affected.len();
        for mut marker in affected {
            marker.balance = origin.balance
                + book.sum_entries(business_id, key, origin.dt_stop, marker.dt_stop);
            book.update_marker(marker)?;
        }
        tracing::debug!(key = %key, from = %from_stop, markers = count, "balances re-derived");
        Ok(count)
    }

    /// Closes the business's journal period for `window` unless it overlaps one already
    /// recorded.
    pub fn close_journal_period(
        book: &mut Book,
        business_id: Uuid,
        window: DateWindow,
    ) -> Result<Option<JournalMarker>> {
        let existing = book.journal_markers(business_id);
        if let Some(same) = existing
            .iter()
            .find(|m| m.dt_start == window.start && m.dt_stop == window.end)
        {
            if same.state != MarkerState::Open {
                return Ok(None);
            }
            let mut closed = JournalMarker::clone(same);
            closed.state = MarkerState::Closed;
            book.upsert_journal_marker(closed.clone())?;
            return Ok(Some(closed));
        }
        if existing
            .iter()
            .any(|m| m.dt_start < window.end && window.start < m.dt_stop)
        {
            tracing::debug!(window = %window, "journal period overlaps an existing one; left as is");
            return Ok(None);
        }
        let marker = JournalMarker {
            id: Uuid::new_v4(),
            business_id,
            state: MarkerState::Closed,
            dt_start: window.start,
            dt_stop: window.end,
        };
        book.upsert_journal_marker(marker.clone())?;
        tracing::debug!(window = %window, "journal period closed");
        Ok(Some(marker))
    }

    /// Locks closed journal periods ending on or before `date`.
    pub fn lock_journal_through(book: &mut Book, business_id: Uuid, date: NaiveDate) -> Result<usize> {
        let targets: Vec<JournalMarker> = book
            .journal_markers(business_id)
            .into_iter()
            .filter(|m| m.dt_stop <= date && m.state == MarkerState::Closed)
            .cloned()
            .collect();
        let count = targets.len();
        for mut marker in targets {
            marker.state = MarkerState::Locked;
            book.upsert_journal_marker(marker)?;
        }
        Ok(count)
    }
}

fn require_tail(book: &Book, business_id: Uuid, key: &AccountKey) -> Result<LedgerMarker> {
    book.tail(business_id, key)
        .cloned()
        .ok_or_else(|| LedgerError::not_found(format!("origin marker for {}", key)))
}

/// Balance of a marker recomputed from the settled marker just before it.
fn settled_balance(book: &Book, marker: &LedgerMarker) -> Result<f64> {
    let prior = book
        .baseline(marker.business_id, &marker.key, marker.dt_start)
        .ok_or_else(|| {
            LedgerError::integrity(format!(
                "{} period [{}, {}) has no settled predecessor",
                marker.key, marker.dt_start, marker.dt_stop
            ))
        })?;
    Ok(prior.balance
        + book.sum_entries(
            marker.business_id,
            &marker.key,
            prior.dt_stop,
            marker.dt_stop,
        ))
}

fn link(book: &mut Book, mut prior: LedgerMarker, next: &LedgerMarker) -> Result<()> {
    book.insert_marker(next.clone())?;
    prior.next = Some(next.id);
    book.update_marker(prior)
}
