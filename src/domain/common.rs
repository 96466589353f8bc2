use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};

/// Identifies entities that expose a stable unique identifier.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Half-open date range `[start, end)` used for batch windows and statements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(LedgerError::validation(format!(
                "date window end {} must be after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Rounds a monetary amount to whole cents, half away from zero.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Compares two amounts within the supplied tolerance.
pub fn amounts_match(left: f64, right: f64, epsilon: f64) -> bool {
    (left - right).abs() <= epsilon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_rejects_empty_range() {
        let err = DateWindow::new(date(2015, 3, 1), date(2015, 3, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn window_is_half_open() {
        let window = DateWindow::new(date(2015, 3, 1), date(2015, 4, 1)).unwrap();
        assert!(window.contains(date(2015, 3, 1)));
        assert!(window.contains(date(2015, 3, 31)));
        assert!(!window.contains(date(2015, 4, 1)));
        assert_eq!(window.days(), 31);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round_cents(33.333_333), 33.33);
        assert_eq!(round_cents(-12.346), -12.35);
        assert!(amounts_match(0.1 + 0.2, 0.3, 0.005));
    }
}
