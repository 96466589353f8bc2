use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeInterval {
    pub every: u32,
    pub unit: TimeUnit,
}

impl TimeInterval {
    /// Returns the date `steps` intervals after `anchor`, computed from the anchor
    /// rather than by chaining, so a 31st anchor lands on every month's last day
    /// without drifting to the 28th after February. `None` past the calendar's range.
    pub fn shift(&self, anchor: NaiveDate, steps: i64) -> Option<NaiveDate> {
        let span = steps.checked_mul(i64::from(self.every.max(1)))?;
        match self.unit {
            TimeUnit::Day => shift_days(anchor, span),
            TimeUnit::Week => shift_days(anchor, span.checked_mul(7)?),
            TimeUnit::Month => shift_month(anchor, span),
            TimeUnit::Year => shift_month(anchor, span.checked_mul(12)?),
        }
    }

    /// Smallest step count whose date is on or after `target`, `None` if no
    /// representable step reaches it.
    pub fn steps_until(&self, anchor: NaiveDate, target: NaiveDate) -> Option<i64> {
        if target <= anchor {
            return Some(0);
        }
        let every = i64::from(self.every.max(1));
        let estimate = match self.unit {
            TimeUnit::Day => (target - anchor).num_days() / every,
            TimeUnit::Week => (target - anchor).num_days() / (7 * every),
            TimeUnit::Month => (month_index(target) - month_index(anchor)) / every,
            TimeUnit::Year => i64::from(target.year() - anchor.year()) / every,
        };
        let mut steps = (estimate - 1).max(0);
        while self.shift(anchor, steps)? < target {
            steps += 1;
        }
        Some(steps)
    }

    pub fn label(&self) -> String {
        match (self.every, self.unit) {
            (1, TimeUnit::Day) => "Daily".into(),
            (1, TimeUnit::Week) => "Weekly".into(),
            (1, TimeUnit::Month) => "Monthly".into(),
            (3, TimeUnit::Month) => "Quarterly".into(),
            (1, TimeUnit::Year) => "Yearly".into(),
            (n, unit) => format!("Every {} {:?}{}", n, unit, if n > 1 { "s" } else { "" }),
        }
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

fn shift_month(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let target = month_index(date).checked_add(months)?;
    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = target.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
