//! Unified error types and result handling.
//!
//! Construction-time errors (`InvalidCycle`, `InvalidLimits`) are rejected
//! synchronously so that no invalid `CycleRule` or `TransactionLimits` value
//! can ever enter the data model. Per-order validation failures are modeled
//! separately as [`ValidationError`] because they are non-fatal: they travel
//! inside a batch report without aborting sibling orders.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::order::OrderId;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid cycle rule: {message}")]
    InvalidCycle { message: String },

    #[error("Invalid transaction limits: {message}")]
    InvalidLimits { message: String },

    #[error("Order validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("No accounts selected")]
    NoAccountsSelected,

    #[error("A submission is already running")]
    AlreadyRunning,

    #[error("Order {order} cannot be edited while a submission is running")]
    EditConflict { order: OrderId },

    #[error("Order {order} not found")]
    OrderNotFound { order: OrderId },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Gateway did not respond within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-order validation failure. Non-fatal within a batch: an order failing
/// validation is reported and skipped, the rest of the batch proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{date} is outside the validity window starting {valid_from}")]
    OutOfDateRange {
        date: NaiveDate,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
    },

    #[error("amount {amount} is outside the permitted range")]
    AmountOutOfBounds {
        amount: Decimal,
        min: Option<Decimal>,
        max: Option<Decimal>,
    },

    #[error("{date} does not fall on the order's cycle")]
    DateNotOnCycle { date: NaiveDate },
}

/// Convenience `Result` type.
pub type Result<T> = std::result::Result<T, Error>;
