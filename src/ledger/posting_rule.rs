//! Posting rules turn one amount into balanced debit and credit legs.
//!
//! A rule is a comma-separated list of `SIDE ACCOUNT SHARE` terms:
//!
//! ```text
//! d ${DFLT.RECEIVABLE} _, c 41000 80%, c 41100 _
//! ```
//!
//! `SIDE` is `d` or `c`. `ACCOUNT` is a GL number or `${ALIAS}`. `SHARE` is `_` (whatever
//! remains of the amount on that side), a percentage such as `25%`, or a fixed amount.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::domain::{amounts_match, round_cents};
use crate::errors::{LedgerError, Result};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    /// General-ledger sign: debits positive, credits negative.
    pub fn sign(self) -> f64 {
        match self {
            Side::Debit => 1.0,
            Side::Credit => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Debit => f.write_str("d"),
            Side::Credit => f.write_str("c"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountRef {
    Number(String),
    Alias(String),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Number(number) => f.write_str(number),
            AccountRef::Alias(alias) => write!(f, "${{{}}}", alias),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Share {
    Remainder,
    Percent(f64),
    Fixed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleTerm {
    pub side: Side,
    pub account: AccountRef,
    pub share: Share,
}

/// Looks up the GL number an account reference stands for.
pub trait AccountResolver {
    fn resolve_account(&self, account: &AccountRef) -> Result<String>;
}

/// A concrete amount destined for one GL account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostingLeg {
    pub side: Side,
    pub gl_number: String,
    pub amount: f64,
}

impl PostingLeg {
    pub fn signed_amount(&self) -> f64 {
        self.side.sign() * self.amount
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostingRule {
    terms: Vec<RuleTerm>,
}

impl PostingRule {
    pub fn parse(text: &str) -> Result<Self> {
        let mut terms = Vec::new();
        for raw in text.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            terms.push(parse_term(raw)?);
        }
        for side in [Side::Debit, Side::Credit] {
            let on_side: Vec<&RuleTerm> = terms.iter().filter(|t| t.side == side).collect();
            if on_side.is_empty() {
                return Err(LedgerError::validation(format!(
                    "posting rule `{}` has no {} terms",
                    text.trim(),
                    side_name(side)
                )));
            }
            let remainders = on_side
                .iter()
                .filter(|t| matches!(t.share, Share::Remainder))
                .count();
            if remainders > 1 {
                return Err(LedgerError::validation(format!(
                    "posting rule `{}` has more than one `_` {} term",
                    text.trim(),
                    side_name(side)
                )));
            }
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[RuleTerm] {
        &self.terms
    }

    /// Splits `amount` into legs. Each side must total `amount` within `epsilon`;
    /// anything else is an integrity failure rather than something to round away.
    pub fn resolve(
        &self,
        amount: f64,
        accounts: &dyn AccountResolver,
        epsilon: f64,
    ) -> Result<Vec<PostingLeg>> {
        let mut legs = Vec::with_capacity(self.terms.len());
        for side in [Side::Debit, Side::Credit] {
            let mut assigned = 0.0;
            let mut remainder_account = None;
            for term in self.terms.iter().filter(|t| t.side == side) {
                let leg_amount = match term.share {
                    Share::Remainder => {
                        remainder_account = Some(accounts.resolve_account(&term.account)?);
                        continue;
                    }
                    Share::Percent(pct) => round_cents(amount * pct / 100.0),
                    Share::Fixed(fixed) => fixed,
                };
                assigned += leg_amount;
                legs.push(PostingLeg {
                    side,
                    gl_number: accounts.resolve_account(&term.account)?,
                    amount: leg_amount,
                });
            }

            let left = round_cents(amount - assigned);
            match remainder_account {
                Some(gl_number) => {
                    if left < -epsilon {
                        return Err(LedgerError::integrity(format!(
                            "{} shares total {:.2}, exceeding the amount {:.2}",
                            side_name(side),
                            assigned,
                            amount
                        )));
                    }
                    legs.push(PostingLeg {
                        side,
                        gl_number,
                        amount: left.max(0.0),
                    });
                }
                None if !amounts_match(assigned, amount, epsilon) => {
                    return Err(LedgerError::integrity(format!(
                        "{} shares total {:.2} but the amount is {:.2}",
                        side_name(side),
                        assigned,
                        amount
                    )));
                }
                None => {}
            }
        }
        legs.retain(|leg| leg.amount != 0.0);
        Ok(legs)
    }
}

impl FromStr for PostingRule {
    type Err = LedgerError;

    fn from_str(text: &str) -> Result<Self> {
        PostingRule::parse(text)
    }
}

impl fmt::Display for PostingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, term) in self.terms.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {} ", term.side, term.account)?;
            match term.share {
                Share::Remainder => f.write_str("_")?,
                Share::Percent(pct) => write!(f, "{}%", pct)?,
                Share::Fixed(fixed) => write!(f, "{:.2}", fixed)?,
            }
        }
        Ok(())
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::Debit => "debit",
        Side::Credit => "credit",
    }
}

fn parse_term(raw: &str) -> Result<RuleTerm> {
    let malformed = |detail: &str| {
        LedgerError::validation(format!("malformed posting term `{}`: {}", raw, detail))
    };
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let [side, account, share] = tokens.as_slice() else {
        return Err(malformed("expected `SIDE ACCOUNT SHARE`"));
    };

    let side = match side.to_ascii_lowercase().as_str() {
        "d" => Side::Debit,
        "c" => Side::Credit,
        _ => return Err(malformed("side must be `d` or `c`")),
    };

    let account = if let Some(alias) = account
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        if alias.is_empty() {
            return Err(malformed("empty account alias"));
        }
        AccountRef::Alias(alias.to_string())
    } else if account.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
        AccountRef::Number(account.to_string())
    } else {
        return Err(malformed("account must be a GL number or `${ALIAS}`"));
    };

    let share = if *share == "_" {
        Share::Remainder
    } else if let Some(pct) = share.strip_suffix('%') {
        let pct: f64 = pct
            .parse()
            .map_err(|_| malformed("percentage is not a number"))?;
        if !(0.0..=100.0).contains(&pct) {
            return Err(malformed("percentage must be between 0 and 100"));
        }
        Share::Percent(pct)
    } else {
        let fixed: f64 = share
            .parse()
            .map_err(|_| malformed("share must be `_`, `N%` or an amount"))?;
        if !fixed.is_finite() || fixed < 0.0 {
            return Err(malformed("fixed share must be non-negative"));
        }
        Share::Fixed(fixed)
    };

    Ok(RuleTerm {
        side,
        account,
        share,
    })
}
