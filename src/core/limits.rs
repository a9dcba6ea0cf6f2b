//! Transaction limits and per-order execution validation.
//!
//! [`TransactionLimits`] bounds how much and when a standing order may
//! execute. Malformed bounds (min above max, validity window ending before
//! it starts) are rejected at construction time, so [`validate`] never has
//! to deal with an inconsistent limit set and never panics on well-typed
//! input.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::order::StandingOrder;
use crate::errors::{Error, Result, ValidationError};

/// Per-order bounds on amount and validity window.
///
/// Owned exclusively by one [`StandingOrder`]; limits are never shared
/// across orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLimits {
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
}

impl TransactionLimits {
    /// Creates a validated limit set. `None` amount bounds are unbounded;
    /// a `None` end date means the order is open-ended.
    ///
    /// # Errors
    /// Returns `InvalidLimits` when `min_amount > max_amount` or
    /// `valid_from > valid_to`.
    pub fn new(
        min_amount: Option<Decimal>,
        max_amount: Option<Decimal>,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
    ) -> Result<Self> {
        if let (Some(min), Some(max)) = (min_amount, max_amount)
            && min > max
        {
            return Err(Error::InvalidLimits {
                message: format!("minimum amount {min} exceeds maximum amount {max}"),
            });
        }
        if let Some(to) = valid_to
            && valid_from > to
        {
            return Err(Error::InvalidLimits {
                message: format!("validity window starts {valid_from}, after it ends {to}"),
            });
        }
        Ok(Self {
            min_amount,
            max_amount,
            valid_from,
            valid_to,
        })
    }

    /// Minimum permitted amount, if bounded.
    #[must_use]
    pub const fn min_amount(&self) -> Option<Decimal> {
        self.min_amount
    }

    /// Maximum permitted amount, if bounded.
    #[must_use]
    pub const fn max_amount(&self) -> Option<Decimal> {
        self.max_amount
    }

    /// First date the order may execute.
    #[must_use]
    pub const fn valid_from(&self) -> NaiveDate {
        self.valid_from
    }

    /// Last date the order may execute, if bounded.
    #[must_use]
    pub const fn valid_to(&self) -> Option<NaiveDate> {
        self.valid_to
    }

    /// Whether `date` lies inside the validity window.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_to.is_none_or(|to| date <= to)
    }

    /// Whether `amount` lies inside the permitted range.
    #[must_use]
    pub fn contains_amount(&self, amount: Decimal) -> bool {
        self.min_amount.is_none_or(|min| amount >= min)
            && self.max_amount.is_none_or(|max| amount <= max)
    }
}

/// Validates a proposed execution of `order` on `candidate_date` for
/// `candidate_amount`.
///
/// Checks run in order and short-circuit on the first failure:
/// 1. the date lies in the limits' validity window,
/// 2. the amount lies in the permitted range,
/// 3. the date falls exactly on the order's cycle (defense against a
///    manually overridden date sneaking past the scheduler).
///
/// # Errors
/// Returns the first failed check as a [`ValidationError`]; these are
/// per-order and non-fatal within a batch.
pub fn validate(
    order: &StandingOrder,
    candidate_date: NaiveDate,
    candidate_amount: Decimal,
) -> std::result::Result<(), ValidationError> {
    let limits = order.limits();
    if !limits.contains_date(candidate_date) {
        return Err(ValidationError::OutOfDateRange {
            date: candidate_date,
            valid_from: limits.valid_from(),
            valid_to: limits.valid_to(),
        });
    }
    if !limits.contains_amount(candidate_amount) {
        return Err(ValidationError::AmountOutOfBounds {
            amount: candidate_amount,
            min: limits.min_amount(),
            max: limits.max_amount(),
        });
    }
    if !order.occurrence_on(candidate_date) {
        return Err(ValidationError::DateNotOnCycle {
            date: candidate_date,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{order_with, test_limits};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_construction_rejects_inverted_amounts() {
        let result = TransactionLimits::new(
            Some(dec!(100)),
            Some(dec!(10)),
            date(2024, 1, 1),
            None,
        );
        assert!(matches!(result, Err(Error::InvalidLimits { .. })));
    }

    #[test]
    fn test_construction_rejects_inverted_window() {
        let result =
            TransactionLimits::new(None, None, date(2024, 6, 1), Some(date(2024, 1, 1)));
        assert!(matches!(result, Err(Error::InvalidLimits { .. })));
    }

    #[test]
    fn test_unbounded_limits_accept_everything() {
        let limits = TransactionLimits::new(None, None, date(2024, 1, 1), None).unwrap();
        assert!(limits.contains_amount(dec!(-5000)));
        assert!(limits.contains_amount(dec!(1000000)));
        assert!(limits.contains_date(date(2099, 12, 31)));
        assert!(!limits.contains_date(date(2023, 12, 31)));
    }

    #[test]
    fn test_validate_out_of_date_range() {
        // Window 2024-01-01..2024-06-30; an execution due 2024-07-01 is
        // out of range.
        let limits = TransactionLimits::new(
            Some(dec!(10)),
            Some(dec!(5000)),
            date(2024, 1, 1),
            Some(date(2024, 6, 30)),
        )
        .unwrap();
        let order = order_with(1, limits, dec!(100));
        let result = validate(&order, date(2024, 7, 1), dec!(100));
        assert!(matches!(
            result,
            Err(ValidationError::OutOfDateRange { .. })
        ));
    }

    #[test]
    fn test_validate_amount_out_of_bounds() {
        let limits = test_limits(date(2024, 1, 1), Some(date(2024, 12, 31)));
        let order = order_with(1, limits, dec!(100));
        // The order's cycle runs on the 15th; use a cycle date so only the
        // amount check can fail.
        let too_small = validate(&order, date(2024, 1, 15), dec!(1));
        assert!(matches!(
            too_small,
            Err(ValidationError::AmountOutOfBounds { .. })
        ));
        let too_large = validate(&order, date(2024, 1, 15), dec!(99999));
        assert!(matches!(
            too_large,
            Err(ValidationError::AmountOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_off_cycle_date() {
        let limits = test_limits(date(2024, 1, 1), Some(date(2024, 12, 31)));
        let order = order_with(1, limits, dec!(100));
        let result = validate(&order, date(2024, 1, 16), dec!(100));
        assert!(matches!(
            result,
            Err(ValidationError::DateNotOnCycle { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_cycle_date_in_window() {
        let limits = test_limits(date(2024, 1, 1), Some(date(2024, 12, 31)));
        let order = order_with(1, limits, dec!(100));
        assert_eq!(validate(&order, date(2024, 1, 15), dec!(100)), Ok(()));
    }

    #[test]
    fn test_validate_agrees_with_due_dates_in_range() {
        use crate::core::schedule::due_dates_in_range;

        let limits = test_limits(date(2024, 1, 1), Some(date(2024, 12, 31)));
        let order = order_with(1, limits, dec!(100));
        let due: Vec<_> = due_dates_in_range(
            order.cycle(),
            date(2024, 1, 1),
            date(2024, 12, 31),
        )
        .collect();

        let mut cursor = date(2024, 1, 1);
        while cursor <= date(2024, 12, 31) {
            let on_cycle = validate(&order, cursor, dec!(100)).is_ok();
            assert_eq!(
                on_cycle,
                due.contains(&cursor),
                "disagreement on {cursor}"
            );
            cursor = cursor.succ_opt().unwrap();
        }
    }
}
