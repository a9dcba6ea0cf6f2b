//! Execution date calculation.
//!
//! Pure functions that turn a [`CycleRule`] plus an anchor date into the
//! next due execution date, or into the full ordered sequence of due dates
//! inside a window. Everything here is deterministic and side-effect free:
//! calling the same function twice with the same inputs yields the same
//! result, which is what makes the scheduler testable.
//!
//! Clamp policy: when a monthly rule names a day a short month does not
//! have (e.g. the 31st in February), the due date clamps to that month's
//! last calendar day. The cycle stays anchored on the configured day, so a
//! rule for the 31st lands on Feb 29, then back on Mar 31.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::core::cycle::CycleRule;

/// Number of days in the given month.
pub(crate) fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(28, |d| d.day())
}

/// The date in `year`/`month` on `day`, clamped to the month's length.
fn clamped(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.min(last_day_of_month(year, month)))
}

/// Advances a (year, month) pair by `months` calendar months.
fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    let total = i64::from(year) * 12 + i64::from(month) - 1 + i64::from(months);
    let year = i32::try_from(total.div_euclid(12)).unwrap_or(i32::MAX);
    let month = u32::try_from(total.rem_euclid(12)).unwrap_or(0) + 1;
    (year, month)
}

fn next_monthly(stride: u32, day: u32, after: NaiveDate) -> Option<NaiveDate> {
    let in_month = clamped(after.year(), after.month(), day)?;
    if in_month > after {
        return Some(in_month);
    }
    // When `after` itself lies on the cycle day the order just executed
    // there, so the next due date is a full stride away. Otherwise the
    // anchor is fresh (e.g. a new order's validity start) and the first
    // occurrence is simply the next month's clamped day.
    let step = if in_month == after { stride } else { 1 };
    let (year, month) = add_months(after.year(), after.month(), step);
    clamped(year, month, day)
}

fn next_weekly(stride: u32, weekday: Weekday, after: NaiveDate) -> Option<NaiveDate> {
    let ahead = (weekday.num_days_from_monday() + 7
        - after.weekday().num_days_from_monday())
        % 7;
    // On the configured weekday itself the next occurrence is a full
    // stride of weeks out; otherwise the upcoming occurrence starts the
    // cycle.
    let days = if ahead == 0 {
        u64::from(stride) * 7
    } else {
        u64::from(ahead)
    };
    after.checked_add_days(Days::new(days))
}

/// Returns the earliest date strictly after `after` that matches `rule`,
/// bounded by `window_end` when given.
///
/// Returns `None` when no matching date exists within the window (or, in
/// the degenerate case, past the supported calendar range).
#[must_use]
pub fn next_due_date(
    rule: &CycleRule,
    after: NaiveDate,
    window_end: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let next = match (rule.day_of_month(), rule.weekday()) {
        (Some(day), _) => next_monthly(rule.stride(), day, after),
        (_, Some(weekday)) => next_weekly(rule.stride(), weekday, after),
        // A validated rule always carries exactly one of the two.
        (None, None) => None,
    }?;
    match window_end {
        Some(end) if next > end => None,
        _ => Some(next),
    }
}

/// Returns the earliest date on or after `from` that matches `rule`,
/// bounded by `window_end` when given.
///
/// Unlike [`next_due_date`], `from` is a fresh anchor and not a prior
/// execution: a `from` lying on the rule's day is itself the first
/// occurrence, and no stride jump is applied.
#[must_use]
pub fn first_due_date(
    rule: &CycleRule,
    from: NaiveDate,
    window_end: Option<NaiveDate>,
) -> Option<NaiveDate> {
    if rule.lands_on(from) {
        match window_end {
            Some(end) if from > end => None,
            _ => Some(from),
        }
    } else {
        next_due_date(rule, from, window_end)
    }
}

/// Lazy, finite, strictly ascending sequence of all due dates of `rule`
/// inside `[from, to]`, with the stride phase anchored at `from`.
///
/// The iterator is `Clone`, so a preview can be restarted cheaply.
#[must_use]
pub fn due_dates_in_range(rule: &CycleRule, from: NaiveDate, to: NaiveDate) -> DueDates {
    let first = if from > to {
        None
    } else {
        first_due_date(rule, from, Some(to))
    };
    DueDates {
        rule: *rule,
        next: first,
        end: to,
    }
}

/// Iterator returned by [`due_dates_in_range`].
#[derive(Debug, Clone)]
pub struct DueDates {
    rule: CycleRule,
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DueDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next.take()?;
        self.next = next_due_date(&self.rule, current, Some(self.end));
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_clamps_to_leap_february() {
        // Day 31, stride 1, executed on 2024-01-31: February 2024 is a
        // leap month, so the next due date clamps to the 29th.
        let rule = CycleRule::monthly(1, 31).unwrap();
        let next = next_due_date(&rule, date(2024, 1, 31), None);
        assert_eq!(next, Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_monthly_recovers_from_clamped_month() {
        // After a clamped execution on Feb 29 the rule returns to the 31st.
        let rule = CycleRule::monthly(1, 31).unwrap();
        let next = next_due_date(&rule, date(2024, 2, 29), None);
        assert_eq!(next, Some(date(2024, 3, 31)));
    }

    #[test]
    fn test_monthly_stride_jumps_from_cycle_day() {
        let rule = CycleRule::monthly(3, 15).unwrap();
        let next = next_due_date(&rule, date(2024, 1, 15), None);
        assert_eq!(next, Some(date(2024, 4, 15)));
    }

    #[test]
    fn test_monthly_fresh_anchor_takes_first_occurrence() {
        // Off-cycle anchor: the first occurrence counts, regardless of
        // stride.
        let rule = CycleRule::monthly(2, 15).unwrap();
        assert_eq!(
            next_due_date(&rule, date(2024, 1, 5), None),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            next_due_date(&rule, date(2024, 1, 20), None),
            Some(date(2024, 2, 15))
        );
    }

    #[test]
    fn test_monthly_year_rollover() {
        let rule = CycleRule::monthly(3, 10).unwrap();
        let next = next_due_date(&rule, date(2024, 11, 10), None);
        assert_eq!(next, Some(date(2025, 2, 10)));
    }

    #[test]
    fn test_weekly_stride_two_from_monday() {
        // 2024-03-04 is a Monday; every second Monday lands on the 18th.
        let rule = CycleRule::weekly(2, Weekday::Mon).unwrap();
        let next = next_due_date(&rule, date(2024, 3, 4), None);
        assert_eq!(next, Some(date(2024, 3, 18)));
    }

    #[test]
    fn test_weekly_fresh_anchor_takes_next_weekday() {
        // 2024-03-05 is a Tuesday; the next Friday is the 8th.
        let rule = CycleRule::weekly(4, Weekday::Fri).unwrap();
        let next = next_due_date(&rule, date(2024, 3, 5), None);
        assert_eq!(next, Some(date(2024, 3, 8)));
    }

    #[test]
    fn test_first_due_date_counts_a_matching_start() {
        // A fresh anchor lying on the rule's day is the first occurrence;
        // the stride does not push it out.
        let rule = CycleRule::weekly(2, Weekday::Mon).unwrap();
        assert_eq!(
            first_due_date(&rule, date(2024, 3, 4), None),
            Some(date(2024, 3, 4))
        );
        assert_eq!(
            first_due_date(&rule, date(2024, 3, 5), None),
            Some(date(2024, 3, 11))
        );
        assert_eq!(first_due_date(&rule, date(2024, 3, 4), Some(date(2024, 3, 1))), None);
    }

    #[test]
    fn test_window_end_cuts_off() {
        let rule = CycleRule::monthly(1, 31).unwrap();
        let next = next_due_date(&rule, date(2024, 1, 31), Some(date(2024, 2, 15)));
        assert_eq!(next, None);
    }

    #[test]
    fn test_next_due_date_is_idempotent() {
        let rule = CycleRule::weekly(2, Weekday::Mon).unwrap();
        let a = next_due_date(&rule, date(2024, 3, 4), Some(date(2024, 12, 31)));
        let b = next_due_date(&rule, date(2024, 3, 4), Some(date(2024, 12, 31)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_due_dates_in_range_monthly() {
        let rule = CycleRule::monthly(1, 31).unwrap();
        let dates: Vec<_> =
            due_dates_in_range(&rule, date(2024, 1, 1), date(2024, 4, 30)).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30),
            ]
        );
    }

    #[test]
    fn test_due_dates_in_range_includes_matching_start() {
        let rule = CycleRule::weekly(2, Weekday::Mon).unwrap();
        let dates: Vec<_> =
            due_dates_in_range(&rule, date(2024, 3, 4), date(2024, 4, 1)).collect();
        assert_eq!(
            dates,
            vec![date(2024, 3, 4), date(2024, 3, 18), date(2024, 4, 1)]
        );
    }

    #[test]
    fn test_due_dates_strictly_ascending_no_duplicates() {
        let rule = CycleRule::monthly(2, 31).unwrap();
        let dates: Vec<_> =
            due_dates_in_range(&rule, date(2023, 12, 31), date(2025, 12, 31)).collect();
        assert!(!dates.is_empty());
        for pair in dates.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_due_dates_empty_for_inverted_range() {
        let rule = CycleRule::monthly(1, 15).unwrap();
        let mut iter = due_dates_in_range(&rule, date(2024, 6, 1), date(2024, 5, 1));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_due_dates_iterator_is_restartable() {
        let rule = CycleRule::weekly(1, Weekday::Wed).unwrap();
        let iter = due_dates_in_range(&rule, date(2024, 3, 1), date(2024, 3, 31));
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2024, 2), 29);
        assert_eq!(last_day_of_month(2023, 2), 28);
        assert_eq!(last_day_of_month(2024, 12), 31);
        assert_eq!(last_day_of_month(2024, 4), 30);
    }
}
