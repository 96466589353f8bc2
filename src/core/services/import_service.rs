//! Loads assessments and receipts from an activity file into a book.

use serde::Deserialize;
use serde_json::Value;

use crate::core::services::RecordOutcome;
use crate::domain::{Assessment, Receipt};
use crate::errors::{LedgerError, Result};
use crate::storage::Book;

/// Activity file accepted by `import`. Records stay raw until applied, so a malformed
/// record is reported on its own instead of rejecting the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActivityFile {
    pub assessments: Vec<Value>,
    pub receipts: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub assessments: Vec<RecordOutcome>,
    pub receipts: Vec<RecordOutcome>,
}

impl ImportReport {
    pub fn imported_assessments(&self) -> usize {
        self.assessments.iter().filter(|o| o.is_success()).count()
    }

    pub fn imported_receipts(&self) -> usize {
        self.receipts.iter().filter(|o| o.is_success()).count()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.assessments.iter().chain(self.receipts.iter())
    }
}

pub struct ImportService;

impl ImportService {
    /// Applies every record of `activity` to `book`.
    ///
    /// New assessments are inserted and unposted ones replaced. Records identical to
    /// what the book already holds are skipped, so re-importing a file is harmless.
    /// Invalid records and edits to posted assessments fail individually.
    pub fn apply(book: &mut Book, activity: ActivityFile, epsilon: f64) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for (idx, raw) in activity.assessments.into_iter().enumerate() {
            let subject = subject("assessment", idx, &raw);
            let applied = serde_json::from_value::<Assessment>(raw)
                .map_err(|err| LedgerError::validation(err.to_string()))
                .and_then(|asmt| apply_assessment(book, asmt, &subject));
            report.assessments.push(settle(subject, applied)?);
        }
        for (idx, raw) in activity.receipts.into_iter().enumerate() {
            let subject = subject("receipt", idx, &raw);
            let applied = serde_json::from_value::<Receipt>(raw)
                .map_err(|err| LedgerError::validation(err.to_string()))
                .and_then(|rcpt| apply_receipt(book, rcpt, epsilon, &subject));
            report.receipts.push(settle(subject, applied)?);
        }
        tracing::info!(
            assessments = report.imported_assessments(),
            receipts = report.imported_receipts(),
            "activity imported"
        );
        Ok(report)
    }
}

fn apply_assessment(book: &mut Book, asmt: Assessment, subject: &str) -> Result<RecordOutcome> {
    match book.assessment(asmt.id) {
        Some(current) if *current == asmt => Ok(RecordOutcome::skipped(subject, "unchanged")),
        Some(_) => {
            book.update_assessment(asmt)?;
            Ok(RecordOutcome::succeeded(subject))
        }
        None => {
            book.insert_assessment(asmt)?;
            Ok(RecordOutcome::succeeded(subject))
        }
    }
}

fn apply_receipt(
    book: &mut Book,
    rcpt: Receipt,
    epsilon: f64,
    subject: &str,
) -> Result<RecordOutcome> {
    if book.receipt(rcpt.id) == Some(&rcpt) {
        return Ok(RecordOutcome::skipped(subject, "unchanged"));
    }
    book.insert_receipt(rcpt, epsilon)?;
    Ok(RecordOutcome::succeeded(subject))
}

fn settle(subject: String, applied: Result<RecordOutcome>) -> Result<RecordOutcome> {
    match applied {
        Ok(outcome) => Ok(outcome),
        Err(err) => RecordOutcome::from_error(subject, err),
    }
}

fn subject(kind: &str, idx: usize, raw: &Value) -> String {
    match raw.get("id").and_then(Value::as_str) {
        Some(id) => format!("{} {}", kind, id),
        None => format!("{} #{}", kind, idx + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::OutcomeStatus;
    use crate::domain::{Frequency, Journal, JournalSource};
    use chrono::NaiveDate;
    use serde_json::json;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rent_json(biz: Uuid, frequency: Value) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "business_id": biz,
            "rentable_id": Uuid::new_v4(),
            "assessment_type": "Rent",
            "amount": 1000.0,
            "start": "2015-01-01",
            "stop": "2016-01-01",
            "frequency": frequency,
            "posting_rule": "d 11000 _, c 41000 _",
        })
    }

    #[test]
    fn accepts_frequency_codes_and_names_per_record() {
        let biz = Uuid::new_v4();
        let activity = ActivityFile {
            assessments: vec![
                rent_json(biz, json!(6)),
                rent_json(biz, json!("7")),
                rent_json(biz, json!("monthly")),
                rent_json(biz, json!("Yearly")),
                rent_json(biz, json!(2)),
            ],
            receipts: Vec::new(),
        };
        let mut book = Book::new();
        let report = ImportService::apply(&mut book, activity, 0.005).unwrap();

        assert_eq!(report.imported_assessments(), 4);
        assert!(matches!(
            report.assessments[4].status,
            OutcomeStatus::Failed(ref reason) if reason.contains("frequency code 2")
        ));
        let mut frequencies: Vec<Frequency> =
            book.assessments_for(biz).map(|asmt| asmt.frequency).collect();
        frequencies.sort_by_key(|f| f.code());
        assert_eq!(
            frequencies,
            vec![
                Frequency::Monthly,
                Frequency::Monthly,
                Frequency::Quarterly,
                Frequency::Yearly
            ]
        );
    }

    #[test]
    fn reimporting_posted_assessments_is_harmless() {
        let biz = Uuid::new_v4();
        let raw = rent_json(biz, json!("Monthly"));
        let mut book = Book::new();
        ImportService::apply(
            &mut book,
            ActivityFile {
                assessments: vec![raw.clone()],
                receipts: Vec::new(),
            },
            0.005,
        )
        .unwrap();

        let asmt = book.assessments_for(biz).next().unwrap().clone();
        let mut jnl = Journal::new(
            biz,
            None,
            date(2015, 1, 1),
            asmt.amount,
            JournalSource::Assessment {
                assessment_id: asmt.id,
            },
        );
        jnl.push_allocation(asmt.rentable_id, asmt.id, asmt.amount, asmt.posting_rule.clone());
        book.insert_journal(jnl, 0.005).unwrap();

        let mut changed = raw.clone();
        changed["amount"] = json!(1100.0);
        let receipt = json!({
            "id": Uuid::new_v4(),
            "business_id": biz,
            "date": "2015-01-05",
            "amount": 1000.0,
            "posting_rule": "d 10100 _, c 11000 _",
            "allocations": [{ "assessment_id": asmt.id, "amount": 1000.0 }],
        });
        let report = ImportService::apply(
            &mut book,
            ActivityFile {
                assessments: vec![raw, changed],
                receipts: vec![receipt],
            },
            0.005,
        )
        .unwrap();

        assert_eq!(
            report.assessments[0].status,
            OutcomeStatus::Skipped("unchanged".into())
        );
        assert!(matches!(report.assessments[1].status, OutcomeStatus::Failed(_)));
        assert_eq!(report.imported_receipts(), 1);
        assert_eq!(book.assessment(asmt.id).unwrap().amount, 1000.0);
    }
}
