use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountKey;
use super::common::Identifiable;

/// Lifecycle of a checkpoint. Transitions only move forward, except that the most
/// recent `Closed` marker may be reopened administratively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MarkerState {
    Origin,
    Open,
    Closed,
    Locked,
}

impl MarkerState {
    /// A settled marker's balance is final and may serve as a query baseline.
    pub fn is_settled(self) -> bool {
        !matches!(self, MarkerState::Open)
    }

    pub fn accepts_postings(self) -> bool {
        matches!(self, MarkerState::Open)
    }
}

impl fmt::Display for MarkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MarkerState::Origin => "ORIGIN",
            MarkerState::Open => "OPEN",
            MarkerState::Closed => "CLOSED",
            MarkerState::Locked => "LOCKED",
        };
        f.write_str(label)
    }
}

/// Balance of one account key over `[dt_start, dt_stop)`.
///
/// `balance` is cumulative from the origin: it includes every ledger row dated before
/// `dt_stop`, so queries continue from `dt_stop` without rescanning history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerMarker {
    pub id: Uuid,
    pub business_id: Uuid,
    pub key: AccountKey,
    pub state: MarkerState,
    pub dt_start: NaiveDate,
    pub dt_stop: NaiveDate,
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Uuid>,
}

impl LedgerMarker {
    pub fn origin(business_id: Uuid, key: AccountKey, date: NaiveDate, balance: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            key,
            state: MarkerState::Origin,
            dt_start: date,
            dt_stop: date,
            balance,
            next: None,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.dt_start && date < self.dt_stop
    }
}

impl Identifiable for LedgerMarker {
    fn id(&self) -> Uuid {
        self.id
    }
}
