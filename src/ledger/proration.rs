use chrono::NaiveDate;

use crate::domain::{round_cents, Proration};

/// Amount charged for the period `[period_start, period_end)` of an assessment that
/// stops at `stop`. Only a period truncated by `stop` is ever reduced.
pub fn prorate(
    amount: f64,
    proration: Proration,
    period_start: NaiveDate,
    period_end: NaiveDate,
    stop: NaiveDate,
) -> f64 {
    match proration {
        Proration::None => amount,
        Proration::Daily => {
            let period_days = (period_end - period_start).num_days();
            if period_days <= 0 || stop >= period_end {
                return amount;
            }
            let covered = (stop - period_start).num_days().clamp(0, period_days);
            round_cents(amount * covered as f64 / period_days as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_proration_charges_covered_days() {
        let charged = prorate(
            3000.0,
            Proration::Daily,
            date(2015, 4, 1),
            date(2015, 5, 1),
            date(2015, 4, 11),
        );
        assert_eq!(charged, 1000.0);
    }

    #[test]
    fn full_periods_and_no_proration_keep_amount() {
        let full = prorate(
            1200.0,
            Proration::Daily,
            date(2015, 4, 1),
            date(2015, 5, 1),
            date(2015, 12, 31),
        );
        assert_eq!(full, 1200.0);
        let unprorated = prorate(
            1200.0,
            Proration::None,
            date(2015, 4, 1),
            date(2015, 5, 1),
            date(2015, 4, 11),
        );
        assert_eq!(unprorated, 1200.0);
    }
}
