//! Single-flight order submission coordinator.
//!
//! The coordinator owns the `Idle -> Running -> {Completed | Failed} ->
//! Idle` state machine around every fetch/update action. The historical
//! design hid this behind an ambient "request running" boolean; here the
//! guard is an explicit, observable state so the single-flight guarantee
//! can be tested: while a run is outstanding, any further start attempt
//! fails synchronously with `AlreadyRunning`.
//!
//! Within one run, due orders are validated and submitted in a fixed
//! deterministic order (ascending due date, then order id) so logs and
//! tests are reproducible. Date computation and validation are synchronous
//! and pure; the gateway call is the only suspension point and runs under
//! a timeout.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::core::limits;
use crate::core::order::{OrderId, StandingOrder};
use crate::core::selection::AccountSelectionSet;
use crate::errors::{Error, Result, ValidationError};
use crate::gateway::{BankingGateway, SubmissionItem, SubmissionOutcome};
use crate::persistence::PersistenceContext;

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No run outstanding; a new one may start.
    Idle,
    /// A run is outstanding; further starts fail with `AlreadyRunning`.
    Running,
    /// The last run finished; its report awaits acknowledgement.
    Completed,
    /// The last run failed; its report awaits acknowledgement.
    Failed,
}

/// Per-order result of one coordinator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOutcome {
    /// Order the outcome belongs to.
    pub order_id: OrderId,
    /// What happened to the order in this run.
    pub status: OutcomeStatus,
}

/// What happened to a single order within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Gateway accepted; `last_executed`/`next_due` have been advanced.
    Accepted {
        /// Date the backend executed on.
        executed: NaiveDate,
    },
    /// Gateway rejected; the order is untouched and remains due.
    Rejected {
        /// Backend-supplied reason.
        reason: String,
    },
    /// Failed local validation and was never submitted.
    Invalid(ValidationError),
}

/// Aggregate result of one coordinator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Per-order outcomes, in deterministic batch order (invalid orders
    /// first, then submitted ones ascending by due date and id).
    pub outcomes: Vec<OrderOutcome>,
}

impl BatchReport {
    /// Number of orders the gateway accepted.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Accepted { .. }))
    }

    /// Number of orders the gateway rejected.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Rejected { .. }))
    }

    /// Number of orders dropped by local validation.
    #[must_use]
    pub fn invalid(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Invalid(_)))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// How a run that was not aborted by an error ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The batch went through; see the report for per-order results.
    Completed(BatchReport),
    /// The run was cancelled in flight; the gateway result was discarded
    /// and no order was advanced.
    Cancelled,
}

/// Result of the last finished run, handed out on acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastRun {
    /// The run completed; partial per-order failures live in the report.
    Completed(BatchReport),
    /// The run was aborted by an I/O error; accepted orders up to that
    /// point have still been advanced.
    Failed {
        /// Display form of the aborting error.
        error: String,
        /// Outcomes gathered before the abort.
        report: BatchReport,
    },
}

enum Phase {
    Idle,
    Running,
    Completed(BatchReport),
    Failed { error: String, report: BatchReport },
}

/// Single-flight asynchronous orchestrator for standing order submission.
///
/// One coordinator exists per account-scope session; it is reset to
/// `Idle` after every acknowledged run.
pub struct OrderSubmissionCoordinator {
    phase: Mutex<Phase>,
    cancelled: AtomicBool,
    cancel_notify: Notify,
    gateway_timeout: Duration,
}

impl OrderSubmissionCoordinator {
    /// Creates a coordinator enforcing `gateway_timeout` on the backend
    /// call.
    #[must_use]
    pub fn new(gateway_timeout: Duration) -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
            cancelled: AtomicBool::new(false),
            cancel_notify: Notify::new(),
            gateway_timeout,
        }
    }

    /// Current observable state.
    pub fn state(&self) -> CoordinatorState {
        match *self.lock_phase() {
            Phase::Idle => CoordinatorState::Idle,
            Phase::Running => CoordinatorState::Running,
            Phase::Completed(_) => CoordinatorState::Completed,
            Phase::Failed { .. } => CoordinatorState::Failed,
        }
    }

    /// Peeks at the last finished run without freeing the coordinator.
    pub fn last_result(&self) -> Option<LastRun> {
        match &*self.lock_phase() {
            Phase::Completed(report) => Some(LastRun::Completed(report.clone())),
            Phase::Failed { error, report } => Some(LastRun::Failed {
                error: error.clone(),
                report: report.clone(),
            }),
            Phase::Idle | Phase::Running => None,
        }
    }

    /// Consumes the last finished run's result and frees the coordinator
    /// for the next one. Returns `None` when there is nothing to
    /// acknowledge.
    pub fn acknowledge(&self) -> Option<LastRun> {
        let mut phase = self.lock_phase();
        match std::mem::replace(&mut *phase, Phase::Idle) {
            Phase::Completed(report) => Some(LastRun::Completed(report)),
            Phase::Failed { error, report } => Some(LastRun::Failed { error, report }),
            other @ (Phase::Idle | Phase::Running) => {
                *phase = other;
                None
            }
        }
    }

    /// Requests cancellation of the running submission. Best-effort: the
    /// in-flight backend call is left to complete on its own and its
    /// result is discarded; from the caller's perspective the coordinator
    /// is free again immediately.
    pub fn cancel(&self) {
        let phase = self.lock_phase();
        if matches!(*phase, Phase::Running) {
            info!("cancellation requested for running submission");
            self.cancelled.store(true, Ordering::SeqCst);
            self.cancel_notify.notify_one();
        }
    }

    /// Single-flight reload of the order set through the persistence
    /// context. Returns `None` when the fetch was cancelled and its result
    /// discarded.
    ///
    /// # Errors
    /// `AlreadyRunning` when a run is outstanding or unacknowledged;
    /// `Persistence` when loading fails (the coordinator then reports
    /// `Failed` until acknowledged).
    pub async fn start_fetch(
        &self,
        persistence: &dyn PersistenceContext,
        scope: &AccountSelectionSet,
    ) -> Result<Option<Vec<StandingOrder>>> {
        self.begin()?;
        debug!(accounts = scope.len(), "fetching standing orders");

        tokio::select! {
            loaded = persistence.load_standing_orders(scope) => match loaded {
                Ok(orders) => {
                    info!(count = orders.len(), "standing orders fetched");
                    self.set_phase(Phase::Idle);
                    Ok(Some(orders))
                }
                Err(e) => {
                    warn!(error = %e, "fetching standing orders failed");
                    self.set_phase(Phase::Failed {
                        error: e.to_string(),
                        report: BatchReport::default(),
                    });
                    Err(e)
                }
            },
            () = self.wait_cancelled() => {
                info!("fetch cancelled, result discarded");
                self.set_phase(Phase::Idle);
                Ok(None)
            }
        }
    }

    /// Single-flight submission of all due orders in `scope`.
    ///
    /// Computes the due set as of `today`, validates every candidate
    /// (invalid ones are reported and skipped without blocking the rest),
    /// submits the valid subset to the gateway as one logical operation,
    /// and advances `last_executed`/`next_due` on every accepted order,
    /// persisting each advance.
    ///
    /// # Errors
    /// `AlreadyRunning` when a run is outstanding or unacknowledged;
    /// `Network`/`Timeout` when the gateway call fails (already-applied
    /// per-order updates are kept); `Persistence` when saving an advanced
    /// order fails.
    pub async fn start_update(
        &self,
        gateway: &dyn BankingGateway,
        persistence: &dyn PersistenceContext,
        orders: &mut [StandingOrder],
        scope: &AccountSelectionSet,
        today: NaiveDate,
    ) -> Result<RunOutcome> {
        self.begin()?;

        let (items, mut report) = compose_batch(orders, scope, today);
        if items.is_empty() {
            info!(
                invalid = report.invalid(),
                "no valid due orders, nothing submitted"
            );
            let outcome = RunOutcome::Completed(report.clone());
            self.set_phase(Phase::Completed(report));
            return Ok(outcome);
        }

        info!(
            submitted = items.len(),
            invalid = report.invalid(),
            "submitting standing order batch"
        );

        let outcomes = {
            let submit = tokio::time::timeout(self.gateway_timeout, gateway.submit(&items));
            tokio::select! {
                res = submit => match res {
                    Ok(Ok(outcomes)) => outcomes,
                    Ok(Err(e)) => {
                        warn!(error = %e, "gateway rejected the batch");
                        self.set_phase(Phase::Failed {
                            error: e.to_string(),
                            report,
                        });
                        return Err(e);
                    }
                    Err(_) => {
                        if gateway.supports_cancellation() {
                            let _ = gateway.cancel().await;
                        }
                        let seconds = self.gateway_timeout.as_secs();
                        let e = Error::Timeout { seconds };
                        warn!(seconds, "gateway submission timed out");
                        self.set_phase(Phase::Failed {
                            error: e.to_string(),
                            report,
                        });
                        return Err(e);
                    }
                },
                () = self.wait_cancelled() => {
                    info!("submission cancelled, gateway result discarded");
                    self.set_phase(Phase::Idle);
                    return Ok(RunOutcome::Cancelled);
                }
            }
        };

        self.apply_outcomes(persistence, orders, &items, outcomes, &mut report)
            .await?;

        info!(
            accepted = report.accepted(),
            rejected = report.rejected(),
            invalid = report.invalid(),
            "standing order batch finished"
        );
        let outcome = RunOutcome::Completed(report.clone());
        self.set_phase(Phase::Completed(report));
        Ok(outcome)
    }

    /// Advances and persists accepted orders; records rejected ones.
    async fn apply_outcomes(
        &self,
        persistence: &dyn PersistenceContext,
        orders: &mut [StandingOrder],
        items: &[SubmissionItem],
        outcomes: Vec<SubmissionOutcome>,
        report: &mut BatchReport,
    ) -> Result<()> {
        for outcome in &outcomes {
            match outcome {
                SubmissionOutcome::Accepted { order_id, executed } => {
                    let Some(order) = orders.iter_mut().find(|o| o.id() == *order_id) else {
                        warn!(order = %order_id, "gateway reported an unknown order");
                        continue;
                    };
                    order.mark_executed(*executed);
                    if let Err(e) = persistence.save_order(order).await {
                        warn!(order = %order_id, error = %e, "saving advanced order failed");
                        report.outcomes.push(OrderOutcome {
                            order_id: *order_id,
                            status: OutcomeStatus::Accepted {
                                executed: *executed,
                            },
                        });
                        self.set_phase(Phase::Failed {
                            error: e.to_string(),
                            report: report.clone(),
                        });
                        return Err(e);
                    }
                    report.outcomes.push(OrderOutcome {
                        order_id: *order_id,
                        status: OutcomeStatus::Accepted {
                            executed: *executed,
                        },
                    });
                }
                SubmissionOutcome::Rejected { order_id, reason } => {
                    warn!(order = %order_id, reason = %reason, "order rejected by gateway");
                    report.outcomes.push(OrderOutcome {
                        order_id: *order_id,
                        status: OutcomeStatus::Rejected {
                            reason: reason.clone(),
                        },
                    });
                }
            }
        }

        // Items the gateway never reported on stay due; record them so the
        // report covers the whole batch.
        for item in items {
            if !outcomes.iter().any(|o| o.order_id() == item.order_id) {
                warn!(order = %item.order_id, "gateway returned no outcome for order");
                report.outcomes.push(OrderOutcome {
                    order_id: item.order_id,
                    status: OutcomeStatus::Rejected {
                        reason: "no outcome reported by gateway".to_string(),
                    },
                });
            }
        }
        Ok(())
    }

    /// Idle -> Running transition; the single-flight guard.
    fn begin(&self) -> Result<()> {
        let mut phase = self.lock_phase();
        match *phase {
            Phase::Idle => {
                self.cancelled.store(false, Ordering::SeqCst);
                *phase = Phase::Running;
                Ok(())
            }
            Phase::Running | Phase::Completed(_) | Phase::Failed { .. } => {
                Err(Error::AlreadyRunning)
            }
        }
    }

    fn set_phase(&self, next: Phase) {
        *self.lock_phase() = next;
    }

    fn lock_phase(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Resolves once a cancellation for the current run arrives. Stale
    /// notify permits from earlier runs are filtered by the `cancelled`
    /// flag, which `begin` resets.
    async fn wait_cancelled(&self) {
        loop {
            self.cancel_notify.notified().await;
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
        }
    }

}

/// Computes and validates the due set, returning gateway items in
/// deterministic order plus a report pre-seeded with the invalid orders.
fn compose_batch(
    orders: &[StandingOrder],
    scope: &AccountSelectionSet,
    today: NaiveDate,
) -> (Vec<SubmissionItem>, BatchReport) {
    let mut report = BatchReport::default();
    let mut due: Vec<(NaiveDate, OrderId, SubmissionItem)> = Vec::new();

    for order in orders {
        if !scope.contains(order.account()) || !order.is_due(today) {
            continue;
        }
        // is_due guarantees a present next_due.
        let Some(date) = order.next_due() else {
            continue;
        };
        let amount = order.payload().amount;
        match limits::validate(order, date, amount) {
            Ok(()) => {
                let payload = order.payload();
                due.push((
                    date,
                    order.id(),
                    SubmissionItem {
                        order_id: order.id(),
                        account: order.account().clone(),
                        execution_date: date,
                        amount,
                        recipient_name: payload.recipient_name.clone(),
                        recipient_iban: payload.recipient_iban.clone(),
                        purpose: payload.purpose.clone(),
                    },
                ));
            }
            Err(validation) => {
                debug!(order = %order.id(), error = %validation, "order dropped by validation");
                report.outcomes.push(OrderOutcome {
                    order_id: order.id(),
                    status: OutcomeStatus::Invalid(validation),
                });
            }
        }
    }

    due.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    let items = due.into_iter().map(|(_, _, item)| item).collect();
    (items, report)
}
