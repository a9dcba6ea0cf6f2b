//! Banking gateway contract.
//!
//! The scheduling core is agnostic to how a backend serializes requests;
//! it only needs to hand over a batch of validated executions and receive
//! a per-order outcome. The gateway call is the single suspension point of
//! a coordinator run.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::order::{AccountId, OrderId};
use crate::errors::Result;

/// One validated execution handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionItem {
    /// Order being executed.
    pub order_id: OrderId,
    /// Account the payment draws from.
    pub account: AccountId,
    /// Due date the execution was scheduled for.
    pub execution_date: NaiveDate,
    /// Amount to transfer.
    pub amount: Decimal,
    /// Payee name.
    pub recipient_name: String,
    /// Payee IBAN.
    pub recipient_iban: String,
    /// Purpose line.
    pub purpose: String,
}

/// Per-order outcome reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The backend accepted the execution on the given date.
    Accepted {
        /// Order the outcome belongs to.
        order_id: OrderId,
        /// Date the backend actually executed on.
        executed: NaiveDate,
    },
    /// The backend rejected this order; the order stays due.
    Rejected {
        /// Order the outcome belongs to.
        order_id: OrderId,
        /// Backend-supplied rejection reason.
        reason: String,
    },
}

impl SubmissionOutcome {
    /// Order this outcome belongs to.
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        match self {
            Self::Accepted { order_id, .. } | Self::Rejected { order_id, .. } => *order_id,
        }
    }
}

/// Asynchronous banking backend executing submission batches.
///
/// Whole-batch failures (network breakdown, backend unavailable) surface
/// as `Err`; per-order rejections are regular outcomes.
#[async_trait]
pub trait BankingGateway: Send + Sync {
    /// Submits the batch as one logical operation and returns one outcome
    /// per item.
    async fn submit(&self, batch: &[SubmissionItem]) -> Result<Vec<SubmissionOutcome>>;

    /// Whether the backend supports cancelling an in-flight submission.
    fn supports_cancellation(&self) -> bool {
        false
    }

    /// Requests cancellation of the in-flight submission, if supported.
    /// The default implementation is a no-op.
    async fn cancel(&self) -> Result<()> {
        Ok(())
    }
}
