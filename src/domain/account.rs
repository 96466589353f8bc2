use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::LedgerError;

/// A general-ledger account in a business's chart of accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlAccount {
    pub business_id: Uuid,
    pub gl_number: String,
    pub name: String,
    /// Symbolic name posting rules may use instead of the number, e.g. `DFLT.CASH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl GlAccount {
    pub fn new(business_id: Uuid, gl_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            business_id,
            gl_number: gl_number.into(),
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Identity an account timeline is tracked by.
///
/// General-ledger keys follow debit-positive signs; rental-agreement keys carry the
/// tenant's view where assessments are negative and receipts positive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountKey {
    Gl(String),
    RentalAgreement(Uuid),
}

impl AccountKey {
    pub fn gl(number: impl Into<String>) -> Self {
        AccountKey::Gl(number.into())
    }

    pub fn is_rental_agreement(&self) -> bool {
        matches!(self, AccountKey::RentalAgreement(_))
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKey::Gl(number) => write!(f, "GL {}", number),
            AccountKey::RentalAgreement(id) => write!(f, "RA {}", id),
        }
    }
}

impl FromStr for AccountKey {
    type Err = LedgerError;

    /// Accepts `gl:NUMBER`, `ra:UUID`, or a bare GL number.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let invalid = || LedgerError::validation(format!("invalid account key `{}`", value));
        match value.split_once(':') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("ra") => Uuid::parse_str(rest.trim())
                .map(AccountKey::RentalAgreement)
                .map_err(|_| invalid()),
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("gl") && !rest.trim().is_empty() => {
                Ok(AccountKey::gl(rest.trim()))
            }
            Some(_) => Err(invalid()),
            None if !value.is_empty() && !value.contains(char::is_whitespace) => {
                Ok(AccountKey::gl(value))
            }
            None => Err(invalid()),
        }
    }
}
