//! Builds journals from due assessment occurrences and receipts.

use crate::core::context::BusinessContext;
use crate::core::services::RecordOutcome;
use crate::domain::{Assessment, DateWindow, Journal, JournalSource, PostingKey, Receipt};
use crate::errors::{LedgerError, Result};
use crate::ledger::{expand, Occurrence};
use crate::storage::Book;

pub struct JournalPoster;

impl JournalPoster {
    /// Posts every assessment occurrence and receipt of the business dated in `window`.
    /// Sources already posted for a date are skipped, so re-running a window is safe.
    pub fn post_window(
        book: &mut Book,
        ctx: &BusinessContext,
        window: DateWindow,
    ) -> Result<Vec<RecordOutcome>> {
        let mut outcomes = Self::post_assessments(book, ctx, window)?;
        outcomes.extend(Self::post_receipts(book, ctx, window)?);
        Ok(outcomes)
    }

    pub fn post_assessments(
        book: &mut Book,
        ctx: &BusinessContext,
        window: DateWindow,
    ) -> Result<Vec<RecordOutcome>> {
        let assessments: Vec<Assessment> =
            book.assessments_for(ctx.business_id()).cloned().collect();
        let mut outcomes = Vec::new();
        for asmt in &assessments {
            let occurrences = match expand(asmt, window) {
                Ok(occurrences) => occurrences,
                Err(err) => {
                    outcomes.push(RecordOutcome::from_error(
                        format!("assessment {}", asmt.id),
                        err,
                    )?);
                    continue;
                }
            };
            for occurrence in occurrences {
                let subject = format!("assessment {} on {}", asmt.id, occurrence.date);
                let key = PostingKey {
                    source_id: asmt.id,
                    date: occurrence.date,
                };
                if book.is_posted(&key) {
                    outcomes.push(RecordOutcome::skipped(subject, "already posted"));
                    continue;
                }
                let built = check_journal_period(book, ctx, occurrence.date)
                    .and_then(|_| Self::assessment_journal(ctx, asmt, &occurrence));
                match built {
                    Ok(journal) => {
                        book.insert_journal(journal, ctx.epsilon())?;
                        outcomes.push(RecordOutcome::succeeded(subject));
                    }
                    Err(err) => outcomes.push(RecordOutcome::from_error(subject, err)?),
                }
            }
        }
        Ok(outcomes)
    }

    pub fn post_receipts(
        book: &mut Book,
        ctx: &BusinessContext,
        window: DateWindow,
    ) -> Result<Vec<RecordOutcome>> {
        let receipts: Vec<Receipt> = book
            .receipts_for(ctx.business_id())
            .filter(|rcpt| window.contains(rcpt.date))
            .cloned()
            .collect();
        let mut outcomes = Vec::new();
        for rcpt in &receipts {
            let subject = format!("receipt {} on {}", rcpt.id, rcpt.date);
            let key = PostingKey {
                source_id: rcpt.id,
                date: rcpt.date,
            };
            if book.is_posted(&key) {
                outcomes.push(RecordOutcome::skipped(subject, "already posted"));
                continue;
            }
            let built = check_journal_period(book, ctx, rcpt.date)
                .and_then(|_| Self::receipt_journal(book, ctx, rcpt));
            match built {
                Ok(journal) => {
                    book.insert_journal(journal, ctx.epsilon())?;
                    outcomes.push(RecordOutcome::succeeded(subject));
                }
                Err(err) => outcomes.push(RecordOutcome::from_error(subject, err)?),
            }
        }
        Ok(outcomes)
    }

    /// One journal with a single allocation for an assessment occurrence.
    pub fn assessment_journal(
        ctx: &BusinessContext,
        asmt: &Assessment,
        occurrence: &Occurrence,
    ) -> Result<Journal> {
        ctx.rentable(asmt.rentable_id)?;
        if let Some(ra) = asmt.rental_agreement_id {
            ctx.rental_agreement(ra)?;
        }
        ctx.resolve_rule(&asmt.posting_rule, occurrence.amount)?;

        let mut journal = Journal::new(
            ctx.business_id(),
            asmt.rental_agreement_id,
            occurrence.date,
            occurrence.amount,
            JournalSource::Assessment {
                assessment_id: asmt.id,
            },
        );
        journal.push_allocation(
            asmt.rentable_id,
            asmt.id,
            occurrence.amount,
            asmt.posting_rule.clone(),
        );
        journal.verify_allocations(ctx.epsilon())?;
        Ok(journal)
    }

    /// One journal per receipt with an allocation for each assessment it pays.
    pub fn receipt_journal(book: &Book, ctx: &BusinessContext, rcpt: &Receipt) -> Result<Journal> {
        rcpt.validate(ctx.epsilon())?;
        if let Some(ra) = rcpt.rental_agreement_id {
            ctx.rental_agreement(ra)?;
        }
        let mut journal = Journal::new(
            ctx.business_id(),
            rcpt.rental_agreement_id,
            rcpt.date,
            rcpt.amount,
            JournalSource::Receipt {
                receipt_id: rcpt.id,
            },
        );
        for alloc in &rcpt.allocations {
            let asmt = book.assessment(alloc.assessment_id).ok_or_else(|| {
                LedgerError::not_found(format!(
                    "assessment {} paid by receipt {}",
                    alloc.assessment_id, rcpt.id
                ))
            })?;
            let rule = rcpt.rule_for(alloc);
            ctx.resolve_rule(rule, alloc.amount)?;
            journal.push_allocation(asmt.rentable_id, asmt.id, alloc.amount, rule);
        }
        journal.verify_allocations(ctx.epsilon())?;
        Ok(journal)
    }
}

fn check_journal_period(
    book: &Book,
    ctx: &BusinessContext,
    date: chrono::NaiveDate,
) -> Result<()> {
    match book.journal_marker_covering(ctx.business_id(), date) {
        Some(marker) if !marker.state.accepts_postings() => Err(LedgerError::concurrency(format!(
            "journal period [{}, {}) is {}",
            marker.dt_start, marker.dt_stop, marker.state
        ))),
        _ => Ok(()),
    }
}
