use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{amounts_match, Identifiable};
use crate::errors::{LedgerError, Result};

/// The share of a receipt applied against one assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptAllocation {
    pub amount: f64,
    pub assessment_id: Uuid,
    /// Falls back to the receipt's rule when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posting_rule: Option<String>,
}

impl ReceiptAllocation {
    pub fn new(assessment_id: Uuid, amount: f64) -> Self {
        Self {
            amount,
            assessment_id,
            posting_rule: None,
        }
    }
}

/// A payment made toward one or more assessments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub id: Uuid,
    pub business_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_agreement_id: Option<Uuid>,
    #[serde(default)]
    pub payment_type: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub posting_rule: String,
    #[serde(default)]
    pub allocations: Vec<ReceiptAllocation>,
}

impl Receipt {
    pub fn new(
        business_id: Uuid,
        date: NaiveDate,
        amount: f64,
        posting_rule: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            rental_agreement_id: None,
            payment_type: String::new(),
            date,
            amount,
            posting_rule: posting_rule.into(),
            allocations: Vec::new(),
        }
    }

    pub fn with_rental_agreement(mut self, rental_agreement_id: Uuid) -> Self {
        self.rental_agreement_id = Some(rental_agreement_id);
        self
    }

    pub fn allocate(mut self, allocation: ReceiptAllocation) -> Self {
        self.allocations.push(allocation);
        self
    }

    pub fn rule_for<'a>(&'a self, allocation: &'a ReceiptAllocation) -> &'a str {
        allocation
            .posting_rule
            .as_deref()
            .unwrap_or(self.posting_rule.as_str())
    }

    /// Checks the amount and that the allocation splits add up to it.
    pub fn validate(&self, epsilon: f64) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(LedgerError::validation(format!(
                "receipt {} amount must be positive, got {}",
                self.id, self.amount
            )));
        }
        if self.allocations.is_empty() {
            return Err(LedgerError::validation(format!(
                "receipt {} has no allocations",
                self.id
            )));
        }
        if let Some(bad) = self
            .allocations
            .iter()
            .find(|alloc| !alloc.amount.is_finite() || alloc.amount <= 0.0)
        {
            return Err(LedgerError::validation(format!(
                "receipt {} allocation against {} must be positive, got {}",
                self.id, bad.assessment_id, bad.amount
            )));
        }
        let allocated: f64 = self.allocations.iter().map(|alloc| alloc.amount).sum();
        if !amounts_match(allocated, self.amount, epsilon) {
            return Err(LedgerError::validation(format!(
                "receipt {} allocations total {:.2} but the receipt is {:.2}",
                self.id, allocated, self.amount
            )));
        }
        Ok(())
    }
}

impl Identifiable for Receipt {
    fn id(&self) -> Uuid {
        self.id
    }
}
