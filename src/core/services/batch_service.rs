//! Batch entry points run by an external scheduler per business and window.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::core::context::BusinessContext;
use crate::core::services::{
    JournalPoster, LedgerWriter, MarkerService, OutcomeStatus, RecordOutcome,
};
use crate::domain::DateWindow;
use crate::errors::Result;
use crate::storage::{Book, LedgerStore};

/// Per-record outcomes of one committed batch unit.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub business_id: Uuid,
    pub window: DateWindow,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    fn new(business_id: Uuid, window: DateWindow) -> Self {
        Self {
            business_id,
            window,
            outcomes: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    fn log(&self, step: &str) {
        tracing::info!(
            step,
            business = %self.business_id,
            window = %self.window,
            succeeded = self.succeeded(),
            skipped = self.skipped(),
            failed = self.failed(),
            "batch step finished"
        );
    }
}

/// Drives the posting pipeline for one business against a store.
///
/// Every public operation is one unit of work: it either commits completely or, on a
/// fatal error, leaves the store exactly as it was.
pub struct BatchService<'a> {
    store: &'a LedgerStore,
    ctx: &'a BusinessContext,
}

impl<'a> BatchService<'a> {
    pub fn new(store: &'a LedgerStore, ctx: &'a BusinessContext) -> Self {
        Self { store, ctx }
    }

    /// Posts journals for assessment occurrences and receipts dated in `[start, end)`.
    pub fn generate_journal_records(&self, start: NaiveDate, end: NaiveDate) -> Result<BatchReport> {
        let window = DateWindow::new(start, end)?;
        self.unit("journals", window, |book, report| {
            report
                .outcomes
                .extend(JournalPoster::post_window(book, self.ctx, window)?);
            Ok(())
        })
    }

    /// Writes ledger rows for the window's journals and advances markers to `end`.
    pub fn generate_ledger_records(&self, start: NaiveDate, end: NaiveDate) -> Result<BatchReport> {
        let window = DateWindow::new(start, end)?;
        self.unit("ledgers", window, |book, report| {
            self.ledger_steps(book, report, window)
        })
    }

    /// Journals, ledger rows and checkpoint for one period in a single unit.
    pub fn run_period(&self, start: NaiveDate, end: NaiveDate) -> Result<BatchReport> {
        let window = DateWindow::new(start, end)?;
        self.unit("period", window, |book, report| {
            report
                .outcomes
                .extend(JournalPoster::post_window(book, self.ctx, window)?);
            self.ledger_steps(book, report, window)
        })
    }

    fn ledger_steps(&self, book: &mut Book, report: &mut BatchReport, window: DateWindow) -> Result<()> {
        let config = self.ctx.config();
        report
            .outcomes
            .extend(LedgerWriter::write_window(book, self.ctx, window, false)?);
        report.outcomes.extend(MarkerService::close_all(
            book,
            self.ctx.business_id(),
            window,
            config.auto_origin,
        )?);
        if config.close_journal_periods {
            MarkerService::close_journal_period(book, self.ctx.business_id(), window)?;
        }
        Ok(())
    }

    fn unit<F>(&self, step: &str, window: DateWindow, work: F) -> Result<BatchReport>
    where
        F: FnOnce(&mut Book, &mut BatchReport) -> Result<()>,
    {
        let span = tracing::info_span!(
            "batch",
            step,
            business = %self.ctx.business().designation,
            window = %window
        );
        let _entered = span.enter();
        let result = self.store.transact(|book| {
            let mut report = BatchReport::new(self.ctx.business_id(), window);
            work(book, &mut report)?;
            Ok(report)
        });
        match result {
            Ok(report) => {
                report.log(step);
                Ok(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "batch unit rolled back");
                Err(err)
            }
        }
    }
}
