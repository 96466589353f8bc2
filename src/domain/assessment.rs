use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Identifiable;
use crate::errors::{LedgerError, Result};
use crate::ledger::time_interval::{TimeInterval, TimeUnit};

/// How often an assessment recurs.
///
/// Serialized by name. Deserialization also accepts the numeric rent-cycle codes, as
/// numbers or strings, and names in any case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "FrequencyRepr")]
pub enum Frequency {
    OneTime,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Maps the numeric rent-cycle codes used by upstream master data.
    ///
    /// Codes 1..=3 (secondly, minutely, hourly) exist upstream but have no meaning for a
    /// date-granular ledger and are rejected along with unknown codes.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Frequency::OneTime),
            4 => Ok(Frequency::Daily),
            5 => Ok(Frequency::Weekly),
            6 => Ok(Frequency::Monthly),
            7 => Ok(Frequency::Quarterly),
            8 => Ok(Frequency::Yearly),
            other => Err(LedgerError::validation(format!(
                "unrecognized frequency code {}",
                other
            ))),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Frequency::OneTime => 0,
            Frequency::Daily => 4,
            Frequency::Weekly => 5,
            Frequency::Monthly => 6,
            Frequency::Quarterly => 7,
            Frequency::Yearly => 8,
        }
    }

    /// Calendar step between occurrences, `None` for one-time charges.
    pub fn interval(self) -> Option<TimeInterval> {
        let (every, unit) = match self {
            Frequency::OneTime => return None,
            Frequency::Daily => (1, TimeUnit::Day),
            Frequency::Weekly => (1, TimeUnit::Week),
            Frequency::Monthly => (1, TimeUnit::Month),
            Frequency::Quarterly => (3, TimeUnit::Month),
            Frequency::Yearly => (1, TimeUnit::Year),
        };
        Some(TimeInterval { every, unit })
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::OneTime => "One-time",
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Quarterly => "Quarterly",
            Frequency::Yearly => "Yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "onetime" | "once" | "norecur" => Ok(Frequency::OneTime),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Frequency::Yearly),
            other => match other.parse::<i64>() {
                Ok(code) => Frequency::from_code(code),
                Err(_) => Err(LedgerError::validation(format!(
                    "unrecognized frequency `{}`",
                    value
                ))),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FrequencyRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<FrequencyRepr> for Frequency {
    type Error = LedgerError;

    fn try_from(repr: FrequencyRepr) -> Result<Self> {
        match repr {
            FrequencyRepr::Code(code) => Frequency::from_code(code),
            FrequencyRepr::Name(name) => name.parse(),
        }
    }
}

/// How the amount of a period cut short by the assessment's stop date is computed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Proration {
    /// Every occurrence charges the full amount.
    #[default]
    None,
    /// Partial periods charge `amount * covered_days / period_days`.
    Daily,
}

/// A recurring or one-time charge against a rentable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub id: Uuid,
    pub business_id: Uuid,
    pub rentable_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_agreement_id: Option<Uuid>,
    pub assessment_type: String,
    pub amount: f64,
    pub start: NaiveDate,
    pub stop: NaiveDate,
    pub frequency: Frequency,
    #[serde(default)]
    pub proration: Proration,
    pub posting_rule: String,
}

impl Assessment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        business_id: Uuid,
        rentable_id: Uuid,
        assessment_type: impl Into<String>,
        amount: f64,
        start: NaiveDate,
        stop: NaiveDate,
        frequency: Frequency,
        posting_rule: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            rentable_id,
            rental_agreement_id: None,
            assessment_type: assessment_type.into(),
            amount,
            start,
            stop,
            frequency,
            proration: Proration::None,
            posting_rule: posting_rule.into(),
        }
    }

    pub fn with_rental_agreement(mut self, rental_agreement_id: Uuid) -> Self {
        self.rental_agreement_id = Some(rental_agreement_id);
        self
    }

    pub fn with_proration(mut self, proration: Proration) -> Self {
        self.proration = proration;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(LedgerError::validation(format!(
                "assessment {} amount must be positive, got {}",
                self.id, self.amount
            )));
        }
        if self.stop < self.start {
            return Err(LedgerError::validation(format!(
                "assessment {} stops ({}) before it starts ({})",
                self.id, self.stop, self.start
            )));
        }
        if self.posting_rule.trim().is_empty() {
            return Err(LedgerError::validation(format!(
                "assessment {} has no posting rule",
                self.id
            )));
        }
        Ok(())
    }
}

impl Identifiable for Assessment {
    fn id(&self) -> Uuid {
        self.id
    }
}
