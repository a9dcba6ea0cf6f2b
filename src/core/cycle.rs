//! Cycle rule data model.
//!
//! A [`CycleRule`] encodes how often a standing order executes: every N
//! months on a fixed day of the month, or every N weeks on a fixed weekday.
//! Rules are validated at construction so that an invalid rule (zero stride,
//! day of month outside 1..=31) can never enter the data model.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::core::schedule::last_day_of_month;
use crate::errors::{Error, Result};

/// Recurrence kind plus the fields that only make sense for that kind.
///
/// Kept private so the "exactly one of day-of-month / weekday" invariant is
/// enforced by the type rather than by runtime checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Kind {
    Monthly { stride: u32, day_of_month: u32 },
    Weekly { stride: u32, weekday: Weekday },
}

/// A validated recurrence rule for a standing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRule {
    kind: Kind,
}

impl CycleRule {
    /// Creates a monthly rule: every `stride` months on `day_of_month`.
    ///
    /// When a target month is shorter than `day_of_month`, execution clamps
    /// to that month's last calendar day (see [`crate::core::schedule`]).
    ///
    /// # Errors
    /// Returns `InvalidCycle` if `stride` is zero or `day_of_month` is
    /// outside 1..=31.
    pub fn monthly(stride: u32, day_of_month: u32) -> Result<Self> {
        if stride < 1 {
            return Err(Error::InvalidCycle {
                message: format!("monthly stride must be at least 1, got {stride}"),
            });
        }
        if !(1..=31).contains(&day_of_month) {
            return Err(Error::InvalidCycle {
                message: format!("day of month must be in 1..=31, got {day_of_month}"),
            });
        }
        Ok(Self {
            kind: Kind::Monthly {
                stride,
                day_of_month,
            },
        })
    }

    /// Creates a weekly rule: every `stride` weeks on `weekday`.
    ///
    /// # Errors
    /// Returns `InvalidCycle` if `stride` is zero.
    pub fn weekly(stride: u32, weekday: Weekday) -> Result<Self> {
        if stride < 1 {
            return Err(Error::InvalidCycle {
                message: format!("weekly stride must be at least 1, got {stride}"),
            });
        }
        Ok(Self {
            kind: Kind::Weekly { stride, weekday },
        })
    }

    /// Whether this is a monthly rule.
    #[must_use]
    pub const fn is_monthly(&self) -> bool {
        matches!(self.kind, Kind::Monthly { .. })
    }

    /// The cycle stride: every N months or every N weeks.
    #[must_use]
    pub const fn stride(&self) -> u32 {
        match self.kind {
            Kind::Monthly { stride, .. } | Kind::Weekly { stride, .. } => stride,
        }
    }

    /// The configured day of month, for monthly rules.
    #[must_use]
    pub const fn day_of_month(&self) -> Option<u32> {
        match self.kind {
            Kind::Monthly { day_of_month, .. } => Some(day_of_month),
            Kind::Weekly { .. } => None,
        }
    }

    /// The configured weekday, for weekly rules.
    #[must_use]
    pub const fn weekday(&self) -> Option<Weekday> {
        match self.kind {
            Kind::Weekly { weekday, .. } => Some(weekday),
            Kind::Monthly { .. } => None,
        }
    }

    /// Whether `date` falls on this rule's execution day, ignoring the
    /// stride phase. For monthly rules a short month's last day counts when
    /// the configured day exceeds the month length (clamp policy).
    #[must_use]
    pub fn lands_on(&self, date: NaiveDate) -> bool {
        match self.kind {
            Kind::Monthly { day_of_month, .. } => {
                let last = last_day_of_month(date.year(), date.month());
                date.day() == day_of_month.min(last)
            }
            Kind::Weekly { weekday, .. } => date.weekday() == weekday,
        }
    }
}
