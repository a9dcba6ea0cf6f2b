//! Standing order aggregate.
//!
//! A [`StandingOrder`] binds an account reference, the payment payload, an
//! owned [`CycleRule`] and [`TransactionLimits`], and the submission
//! bookkeeping (`last_executed`, `next_due`). `next_due` is derived state:
//! it is recomputed whenever the cycle, the limits, or the last execution
//! date changes, and is never trusted from the outside.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::cycle::CycleRule;
use crate::core::limits::TransactionLimits;
use crate::core::schedule::{first_due_date, next_due_date};

/// Stable identifier of a standing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to an external account entity, looked up by id. The account
/// itself is not owned by the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recipient, amount, and purpose of a standing order.
///
/// Opaque to the scheduler except for the amount, which limit validation
/// checks against the order's bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Name of the payee.
    pub recipient_name: String,
    /// IBAN of the payee account.
    pub recipient_iban: String,
    /// Amount transferred per execution.
    pub amount: Decimal,
    /// Free-text purpose line.
    pub purpose: String,
}

/// A persisted instruction to recurrently execute a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingOrder {
    id: OrderId,
    account: AccountId,
    payload: PaymentPayload,
    cycle: CycleRule,
    limits: TransactionLimits,
    last_executed: Option<NaiveDate>,
    next_due: Option<NaiveDate>,
    retired: bool,
}

impl StandingOrder {
    /// Creates a new order and computes its first due date. The cycle and
    /// limits are already validated by their own constructors, so this
    /// cannot fail.
    #[must_use]
    pub fn new(
        id: OrderId,
        account: AccountId,
        payload: PaymentPayload,
        cycle: CycleRule,
        limits: TransactionLimits,
    ) -> Self {
        let mut order = Self {
            id,
            account,
            payload,
            cycle,
            limits,
            last_executed: None,
            next_due: None,
            retired: false,
        };
        order.recompute_next_due();
        order
    }

    /// Order identifier.
    #[must_use]
    pub const fn id(&self) -> OrderId {
        self.id
    }

    /// Account this order draws from.
    #[must_use]
    pub const fn account(&self) -> &AccountId {
        &self.account
    }

    /// Recipient/amount/purpose payload.
    #[must_use]
    pub const fn payload(&self) -> &PaymentPayload {
        &self.payload
    }

    /// The order's recurrence rule.
    #[must_use]
    pub const fn cycle(&self) -> &CycleRule {
        &self.cycle
    }

    /// The order's transaction limits.
    #[must_use]
    pub const fn limits(&self) -> &TransactionLimits {
        &self.limits
    }

    /// Date of the last accepted execution, if any.
    #[must_use]
    pub const fn last_executed(&self) -> Option<NaiveDate> {
        self.last_executed
    }

    /// The next derived due date. `None` when the order is exhausted (its
    /// validity window has run out) or cannot produce a date.
    #[must_use]
    pub const fn next_due(&self) -> Option<NaiveDate> {
        self.next_due
    }

    /// Whether the order has been soft-deleted after exhausting its
    /// validity window.
    #[must_use]
    pub const fn is_retired(&self) -> bool {
        self.retired
    }

    /// Whether the order is due on or before `on`.
    #[must_use]
    pub fn is_due(&self, on: NaiveDate) -> bool {
        !self.retired && self.next_due.is_some_and(|due| due <= on)
    }

    /// Replaces the recurrence rule and recomputes the due date.
    pub fn set_cycle(&mut self, cycle: CycleRule) {
        self.cycle = cycle;
        self.recompute_next_due();
    }

    /// Replaces the limits and recomputes the due date.
    pub fn set_limits(&mut self, limits: TransactionLimits) {
        self.limits = limits;
        self.recompute_next_due();
    }

    /// Records an accepted execution on `date` and advances the due date.
    pub fn mark_executed(&mut self, date: NaiveDate) {
        self.last_executed = Some(date);
        self.recompute_next_due();
    }

    /// First upcoming occurrence of this order's cycle, bounded by
    /// `window_end`.
    ///
    /// An order with an execution inside the validity window continues its
    /// cycle a full stride after that execution. An order that has never
    /// run (or whose window was moved past its history) gets the first
    /// occurrence on or after `valid_from`, even when the day before the
    /// window happens to lie on the cycle day.
    fn upcoming_occurrence(&self, window_end: Option<NaiveDate>) -> Option<NaiveDate> {
        match self.last_executed {
            Some(last) if last >= self.limits.valid_from() => {
                next_due_date(&self.cycle, last, window_end)
            }
            _ => first_due_date(&self.cycle, self.limits.valid_from(), window_end),
        }
    }

    /// Whether `date` is an execution date of this order's cycle, anchored
    /// at the order's own history (last execution or validity start).
    #[must_use]
    pub fn occurrence_on(&self, date: NaiveDate) -> bool {
        let Some(mut cursor) = self.upcoming_occurrence(None) else {
            return false;
        };
        loop {
            if cursor >= date {
                return cursor == date;
            }
            match next_due_date(&self.cycle, cursor, None) {
                Some(d) => cursor = d,
                None => return false,
            }
        }
    }

    /// Recomputes `next_due` from the cycle, limits, and last execution.
    /// An order whose bounded validity window can no longer produce a due
    /// date is retired (soft delete).
    pub fn recompute_next_due(&mut self) {
        self.next_due = self.upcoming_occurrence(self.limits.valid_to());
        self.retired = self.next_due.is_none() && self.limits.valid_to().is_some();
    }
}
