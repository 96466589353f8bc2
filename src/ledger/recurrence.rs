use chrono::NaiveDate;
use serde::Serialize;

use super::proration::prorate;
use super::time_interval::TimeInterval;
use crate::domain::{Assessment, DateWindow, Frequency};
use crate::errors::Result;

/// One due date of an assessment and the amount charged for it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Occurrence {
    pub date: NaiveDate,
    /// Start of the next period, or the occurrence date itself for one-time charges.
    pub period_end: NaiveDate,
    pub amount: f64,
}

/// Due dates of a schedule inside `window`, ascending.
///
/// Recurring schedules produce dates in `[max(start, window.start), min(stop, window.end))`.
/// One-time charges and schedules with `start == stop` produce at most a single date at
/// `start`.
pub fn occurrence_dates(
    start: NaiveDate,
    stop: NaiveDate,
    frequency: Frequency,
    window: DateWindow,
) -> Vec<NaiveDate> {
    match frequency.interval() {
        Some(interval) if start < stop => recurring(start, stop, interval, window)
            .into_iter()
            .map(|(_, date)| date)
            .collect(),
        _ => single(start, window),
    }
}

/// Expands an assessment into its occurrences within `window`, applying proration to
/// a final period cut short by the assessment's stop date.
pub fn expand(assessment: &Assessment, window: DateWindow) -> Result<Vec<Occurrence>> {
    assessment.validate()?;
    let (start, stop) = (assessment.start, assessment.stop);
    let occurrences = match assessment.frequency.interval() {
        Some(interval) if start < stop => recurring(start, stop, interval, window)
            .into_iter()
            .map(|(step, date)| {
                let period_end = interval
                    .shift(start, step + 1)
                    .unwrap_or(NaiveDate::MAX);
                Occurrence {
                    date,
                    period_end,
                    amount: prorate(
                        assessment.amount,
                        assessment.proration,
                        date,
                        period_end,
                        stop,
                    ),
                }
            })
            .collect(),
        _ => single(start, window)
            .into_iter()
            .map(|date| Occurrence {
                date,
                period_end: date,
                amount: assessment.amount,
            })
            .collect(),
    };
    Ok(occurrences)
}

fn single(date: NaiveDate, window: DateWindow) -> Vec<NaiveDate> {
    if window.contains(date) {
        vec![date]
    } else {
        Vec::new()
    }
}

/// `(step, date)` pairs where `date` is `step` intervals after `start`. Stops at the
/// end of the representable calendar.
fn recurring(
    start: NaiveDate,
    stop: NaiveDate,
    interval: TimeInterval,
    window: DateWindow,
) -> Vec<(i64, NaiveDate)> {
    let lower = start.max(window.start);
    let upper = stop.min(window.end);
    if lower >= upper {
        return Vec::new();
    }
    let Some(first) = interval.steps_until(start, lower) else {
        return Vec::new();
    };
    let mut dates = Vec::new();
    for step in first.. {
        match interval.shift(start, step) {
            Some(date) if date < upper => dates.push((step, date)),
            _ => break,
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Proration;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window(start: NaiveDate, end: NaiveDate) -> DateWindow {
        DateWindow::new(start, end).unwrap()
    }

    #[test]
    fn monthly_schedule_is_clipped_to_window() {
        let dates = occurrence_dates(
            date(2015, 1, 1),
            date(2015, 12, 31),
            Frequency::Monthly,
            window(date(2015, 3, 1), date(2015, 6, 1)),
        );
        assert_eq!(
            dates,
            vec![date(2015, 3, 1), date(2015, 4, 1), date(2015, 5, 1)]
        );
    }

    #[test]
    fn schedule_outside_window_is_empty() {
        let w = window(date(2015, 3, 1), date(2015, 4, 1));
        assert!(occurrence_dates(date(2015, 1, 1), date(2015, 3, 1), Frequency::Monthly, w)
            .is_empty());
        assert!(occurrence_dates(date(2015, 4, 1), date(2015, 9, 1), Frequency::Monthly, w)
            .is_empty());
    }

    #[test]
    fn degenerate_and_one_time_schedules_yield_single_date() {
        let w = window(date(2015, 3, 1), date(2015, 4, 1));
        let day = date(2015, 3, 10);
        assert_eq!(occurrence_dates(day, day, Frequency::Monthly, w), vec![day]);
        assert_eq!(
            occurrence_dates(day, date(2015, 12, 31), Frequency::OneTime, w),
            vec![day]
        );
        assert!(occurrence_dates(date(2015, 4, 10), date(2015, 4, 10), Frequency::Daily, w)
            .is_empty());
    }

    #[test]
    fn weekly_schedule_keeps_anchor_weekday() {
        let dates = occurrence_dates(
            date(2015, 1, 5),
            date(2015, 12, 31),
            Frequency::Weekly,
            window(date(2015, 3, 1), date(2015, 3, 20)),
        );
        assert_eq!(
            dates,
            vec![date(2015, 3, 2), date(2015, 3, 9), date(2015, 3, 16)]
        );
    }

    #[test]
    fn expansion_is_restartable() {
        let asmt = Assessment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Rent",
            1000.0,
            date(2015, 1, 1),
            date(2015, 12, 31),
            Frequency::Monthly,
            "d 11000 _, c 41000 _",
        );
        let w = window(date(2015, 2, 1), date(2015, 8, 1));
        assert_eq!(expand(&asmt, w).unwrap(), expand(&asmt, w).unwrap());
    }

    #[test]
    fn final_partial_period_is_prorated() {
        let asmt = Assessment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Rent",
            3000.0,
            date(2015, 1, 1),
            date(2015, 4, 11),
            Frequency::Monthly,
            "d 11000 _, c 41000 _",
        )
        .with_proration(Proration::Daily);
        let occurrences = expand(&asmt, window(date(2015, 3, 1), date(2015, 6, 1))).unwrap();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].amount, 3000.0);
        assert_eq!(occurrences[1].date, date(2015, 4, 1));
        assert_eq!(occurrences[1].amount, 1000.0);
    }

    #[test]
    fn month_end_periods_are_measured_from_the_anchor() {
        let asmt = Assessment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Rent",
            3100.0,
            date(2015, 1, 31),
            date(2015, 3, 15),
            Frequency::Monthly,
            "d 11000 _, c 41000 _",
        )
        .with_proration(Proration::Daily);
        let occurrences = expand(&asmt, window(date(2015, 1, 1), date(2015, 4, 1))).unwrap();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].period_end, date(2015, 2, 28));
        assert_eq!(occurrences[0].amount, 3100.0);
        assert_eq!(occurrences[1].date, date(2015, 2, 28));
        assert_eq!(occurrences[1].period_end, date(2015, 3, 31));
        assert_eq!(occurrences[1].amount, 1500.0);
    }

    #[test]
    fn schedules_reaching_the_calendar_end_terminate() {
        let start = NaiveDate::MAX - chrono::Days::new(10);
        let w = window(start, NaiveDate::MAX);
        let daily = occurrence_dates(start, NaiveDate::MAX, Frequency::Daily, w);
        assert_eq!(daily.len(), 10);
        let monthly = occurrence_dates(start, NaiveDate::MAX, Frequency::Monthly, w);
        assert_eq!(monthly, vec![start]);

        let asmt = Assessment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Rent",
            500.0,
            start,
            NaiveDate::MAX,
            Frequency::Yearly,
            "d 11000 _, c 41000 _",
        )
        .with_proration(Proration::Daily);
        let occurrences = expand(&asmt, w).unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].period_end, NaiveDate::MAX);
    }
}
