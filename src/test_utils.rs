//! Shared test utilities.
//!
//! Helpers for building orders and limits with sensible defaults, plus a
//! scriptable mock gateway and a failing persistence double for exercising
//! coordinator error paths.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::cycle::CycleRule;
use crate::core::limits::TransactionLimits;
use crate::core::order::{AccountId, OrderId, PaymentPayload, StandingOrder};
use crate::core::selection::AccountSelectionSet;
use crate::errors::{Error, Result};
use crate::gateway::{BankingGateway, SubmissionItem, SubmissionOutcome};
use crate::persistence::PersistenceContext;

/// Initializes tracing for a test run. Safe to call from every test;
/// only the first call installs the subscriber.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Limits with a 10..=5000 amount range and the given validity window.
pub fn test_limits(valid_from: NaiveDate, valid_to: Option<NaiveDate>) -> TransactionLimits {
    TransactionLimits::new(Some(dec!(10)), Some(dec!(5000)), valid_from, valid_to).unwrap()
}

/// Standing order on account `DE01`, monthly on the 15th, stride 1.
pub fn order_with(id: u64, limits: TransactionLimits, amount: Decimal) -> StandingOrder {
    order_for_account(id, "DE01", limits, amount)
}

/// Standing order on the given account, monthly on the 15th, stride 1.
pub fn order_for_account(
    id: u64,
    account: &str,
    limits: TransactionLimits,
    amount: Decimal,
) -> StandingOrder {
    StandingOrder::new(
        OrderId(id),
        AccountId(account.to_string()),
        PaymentPayload {
            recipient_name: "ACME Utilities".to_string(),
            recipient_iban: "DE89370400440532013000".to_string(),
            amount,
            purpose: "monthly service".to_string(),
        },
        CycleRule::monthly(1, 15).unwrap(),
        limits,
    )
}

/// Selection over the given account ids.
pub fn selection(accounts: &[&str]) -> AccountSelectionSet {
    AccountSelectionSet::new(accounts.iter().map(|a| AccountId((*a).to_string()))).unwrap()
}

/// Scripted gateway behavior for tests.
pub enum MockBehavior {
    /// Accept every item on its scheduled date.
    AcceptAll,
    /// Reject items whose order id is listed, accept the rest.
    RejectIds(Vec<u64>),
    /// Fail the whole batch with a network error.
    NetworkError,
    /// Never resolve (for timeout and cancellation tests).
    Hang,
}

/// Mock banking gateway recording the batches it receives.
pub struct MockGateway {
    behavior: MockBehavior,
    /// Number of submit calls made.
    pub calls: AtomicUsize,
    /// Most recent batch handed to `submit`.
    pub last_batch: Mutex<Vec<SubmissionItem>>,
}

impl MockGateway {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_batch: Mutex::new(Vec::new()),
        }
    }

    fn accept_all(batch: &[SubmissionItem]) -> Vec<SubmissionOutcome> {
        batch
            .iter()
            .map(|item| SubmissionOutcome::Accepted {
                order_id: item.order_id,
                executed: item.execution_date,
            })
            .collect()
    }
}

#[async_trait]
impl BankingGateway for MockGateway {
    async fn submit(&self, batch: &[SubmissionItem]) -> Result<Vec<SubmissionOutcome>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_batch.lock().unwrap() = batch.to_vec();
        match &self.behavior {
            MockBehavior::AcceptAll => Ok(Self::accept_all(batch)),
            MockBehavior::RejectIds(ids) => Ok(batch
                .iter()
                .map(|item| {
                    if ids.contains(&item.order_id.0) {
                        SubmissionOutcome::Rejected {
                            order_id: item.order_id,
                            reason: "insufficient funds".to_string(),
                        }
                    } else {
                        SubmissionOutcome::Accepted {
                            order_id: item.order_id,
                            executed: item.execution_date,
                        }
                    }
                })
                .collect()),
            MockBehavior::NetworkError => Err(Error::Network {
                message: "connection reset by peer".to_string(),
            }),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Persistence double whose saves always fail.
#[derive(Debug, Default)]
pub struct FailingPersistence;

#[async_trait]
impl PersistenceContext for FailingPersistence {
    async fn load_standing_orders(
        &self,
        _scope: &AccountSelectionSet,
    ) -> Result<Vec<StandingOrder>> {
        Err(Error::Persistence {
            message: "store unavailable".to_string(),
        })
    }

    async fn save_order(&self, _order: &StandingOrder) -> Result<()> {
        Err(Error::Persistence {
            message: "store unavailable".to_string(),
        })
    }
}
