//! Presentation-facing session facade.
//!
//! [`OrderSession`] is the view-model contract the UI layer talks to: it
//! exposes the intents (`set_cycle`, `set_limits`, `fetch_due_orders`,
//! `update_due_orders`, `cancel_running_submission`) and the observable
//! state (coordinator state, last result, validation errors) without
//! leaking any widget concerns into the core. The session owns the
//! in-memory order set and is the only path through which a presentation
//! layer may mutate it; edits attempted while a submission is running are
//! rejected with `EditConflict`.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::core::coordinator::{
    CoordinatorState, LastRun, OrderSubmissionCoordinator, OutcomeStatus, RunOutcome,
};
use crate::core::cycle::CycleRule;
use crate::core::limits::TransactionLimits;
use crate::core::order::{OrderId, StandingOrder};
use crate::core::schedule::next_due_date;
use crate::core::selection::AccountSelectionSet;
use crate::errors::{Error, Result, ValidationError};
use crate::gateway::BankingGateway;
use crate::persistence::PersistenceContext;

/// Snapshot of an order's editable fields, captured before a
/// presentation-driven edit so an in-progress edit can be reverted.
///
/// Transient by design: it lives outside [`StandingOrder`] and is dropped
/// once the edit is committed or reverted.
#[derive(Debug, Clone)]
pub struct EditSnapshot {
    order_id: OrderId,
    cycle: CycleRule,
    limits: TransactionLimits,
}

impl EditSnapshot {
    /// Captures the editable fields of `order`.
    #[must_use]
    pub fn capture(order: &StandingOrder) -> Self {
        Self {
            order_id: order.id(),
            cycle: *order.cycle(),
            limits: order.limits().clone(),
        }
    }

    /// Order this snapshot belongs to.
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        self.order_id
    }

    fn restore(&self, order: &mut StandingOrder) {
        order.set_cycle(self.cycle);
        order.set_limits(self.limits.clone());
    }
}

/// Session binding the order set, the submission coordinator, and the
/// gateway/persistence collaborators for one account scope.
pub struct OrderSession<G, P> {
    gateway: Arc<G>,
    persistence: Arc<P>,
    coordinator: OrderSubmissionCoordinator,
    config: SchedulerConfig,
    orders: RwLock<Vec<StandingOrder>>,
    validation_errors: Mutex<Vec<(OrderId, ValidationError)>>,
}

impl<G, P> OrderSession<G, P>
where
    G: BankingGateway,
    P: PersistenceContext,
{
    /// Creates a session over the given collaborators.
    #[must_use]
    pub fn new(gateway: Arc<G>, persistence: Arc<P>, config: SchedulerConfig) -> Self {
        let coordinator = OrderSubmissionCoordinator::new(config.gateway_timeout());
        Self {
            gateway,
            persistence,
            coordinator,
            config,
            orders: RwLock::new(Vec::new()),
            validation_errors: Mutex::new(Vec::new()),
        }
    }

    /// Observable coordinator state.
    pub fn coordinator_state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    /// Observable result of the last finished run, without consuming it.
    pub fn last_result(&self) -> Option<LastRun> {
        self.coordinator.last_result()
    }

    /// Consumes the last finished run's result, freeing the coordinator.
    pub fn acknowledge_result(&self) -> Option<LastRun> {
        self.coordinator.acknowledge()
    }

    /// Validation errors gathered by the most recent update run.
    pub fn validation_errors(&self) -> Vec<(OrderId, ValidationError)> {
        self.lock_validation_errors().clone()
    }

    /// Snapshot of the session's current orders.
    pub async fn orders(&self) -> Vec<StandingOrder> {
        self.orders.read().await.clone()
    }

    /// Reloads the order set for `scope` through the persistence context.
    /// Returns the number of orders now held; a cancelled fetch leaves the
    /// set untouched.
    ///
    /// # Errors
    /// `AlreadyRunning` while another run is outstanding; `Persistence`
    /// when loading fails.
    pub async fn fetch_due_orders(&self, scope: &AccountSelectionSet) -> Result<usize> {
        match self.coordinator.start_fetch(&*self.persistence, scope).await? {
            Some(loaded) => {
                let mut orders = self.orders.write().await;
                *orders = loaded;
                Ok(orders.len())
            }
            None => Ok(self.orders.read().await.len()),
        }
    }

    /// Submits all orders due in `scope` as of `today` and refreshes the
    /// observable validation errors from the run's report.
    ///
    /// # Errors
    /// `AlreadyRunning` while another run is outstanding; `Network`,
    /// `Timeout`, or `Persistence` when the run aborts.
    pub async fn update_due_orders(
        &self,
        scope: &AccountSelectionSet,
        today: NaiveDate,
    ) -> Result<RunOutcome> {
        let mut orders = self.orders.write().await;
        let outcome = self
            .coordinator
            .start_update(
                &*self.gateway,
                &*self.persistence,
                orders.as_mut_slice(),
                scope,
                today,
            )
            .await?;

        if let RunOutcome::Completed(report) = &outcome {
            let mut errors = self.lock_validation_errors();
            errors.clear();
            for entry in &report.outcomes {
                if let OutcomeStatus::Invalid(validation) = &entry.status {
                    errors.push((entry.order_id, validation.clone()));
                }
            }
        }
        Ok(outcome)
    }

    /// Requests cancellation of the running submission, if any.
    pub fn cancel_running_submission(&self) {
        self.coordinator.cancel();
    }

    /// Adds a new order to the session and persists it.
    ///
    /// # Errors
    /// `EditConflict` while a submission is running; `Persistence` when
    /// saving fails (the order is then not added).
    pub async fn add_order(&self, order: StandingOrder) -> Result<()> {
        let mut orders = self.guarded_orders(order.id())?;
        self.persistence.save_order(&order).await?;
        info!(order = %order.id(), "standing order added");
        orders.push(order);
        Ok(())
    }

    /// Replaces the recurrence rule of one order and persists the change.
    /// A failed save reverts the in-memory edit, so persisted and held
    /// state never diverge.
    ///
    /// # Errors
    /// `EditConflict` while a submission is running; `OrderNotFound` for
    /// an unknown id; `Persistence` when saving fails.
    pub async fn set_cycle(&self, id: OrderId, cycle: CycleRule) -> Result<()> {
        let mut orders = self.guarded_orders(id)?;
        let order = find_order(orders.as_mut_slice(), id)?;
        let snapshot = EditSnapshot::capture(order);
        order.set_cycle(cycle);
        if let Err(e) = self.persistence.save_order(order).await {
            snapshot.restore(order);
            return Err(e);
        }
        debug!(order = %id, "cycle updated");
        Ok(())
    }

    /// Replaces the limits of one order and persists the change. A failed
    /// save reverts the in-memory edit.
    ///
    /// # Errors
    /// `EditConflict` while a submission is running; `OrderNotFound` for
    /// an unknown id; `Persistence` when saving fails.
    pub async fn set_limits(&self, id: OrderId, limits: TransactionLimits) -> Result<()> {
        let mut orders = self.guarded_orders(id)?;
        let order = find_order(orders.as_mut_slice(), id)?;
        let snapshot = EditSnapshot::capture(order);
        order.set_limits(limits);
        if let Err(e) = self.persistence.save_order(order).await {
            snapshot.restore(order);
            return Err(e);
        }
        debug!(order = %id, "limits updated");
        Ok(())
    }

    /// Captures a revert point for an in-progress presentation edit.
    ///
    /// # Errors
    /// `OrderNotFound` for an unknown id.
    pub async fn begin_edit(&self, id: OrderId) -> Result<EditSnapshot> {
        let orders = self.orders.read().await;
        let order = orders
            .iter()
            .find(|o| o.id() == id)
            .ok_or(Error::OrderNotFound { order: id })?;
        Ok(EditSnapshot::capture(order))
    }

    /// Reverts an order to a previously captured snapshot and persists the
    /// reverted state.
    ///
    /// # Errors
    /// `EditConflict` while a submission is running; `OrderNotFound` when
    /// the snapshot's order no longer exists; `Persistence` when saving
    /// fails.
    pub async fn cancel_edit(&self, snapshot: &EditSnapshot) -> Result<()> {
        let id = snapshot.order_id();
        let mut orders = self.guarded_orders(id)?;
        let order = find_order(orders.as_mut_slice(), id)?;
        snapshot.restore(order);
        self.persistence.save_order(order).await?;
        debug!(order = %id, "edit reverted");
        Ok(())
    }

    /// The order's upcoming execution dates strictly after `after`,
    /// bounded by its validity window. The dates are taken from the
    /// order's own schedule (anchored at its last execution or validity
    /// start), so every previewed date is one the order would actually
    /// execute on. The count comes from the configuration
    /// (`preview_occurrences`).
    ///
    /// # Errors
    /// `OrderNotFound` for an unknown id.
    pub async fn preview_occurrences(
        &self,
        id: OrderId,
        after: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let orders = self.orders.read().await;
        let order = orders
            .iter()
            .find(|o| o.id() == id)
            .ok_or(Error::OrderNotFound { order: id })?;

        let mut dates = Vec::with_capacity(self.config.preview_occurrences);
        let mut cursor = order.next_due();
        while dates.len() < self.config.preview_occurrences {
            let Some(due) = cursor else { break };
            if due > after {
                dates.push(due);
            }
            cursor = next_due_date(order.cycle(), due, order.limits().valid_to());
        }
        Ok(dates)
    }

    /// Acquires the order set for an edit, enforcing the edit/submission
    /// mutual exclusion: while a run holds the write lock (or the
    /// coordinator reports `Running`), edits fail instead of queueing.
    fn guarded_orders(
        &self,
        id: OrderId,
    ) -> Result<tokio::sync::RwLockWriteGuard<'_, Vec<StandingOrder>>> {
        if self.coordinator.state() == CoordinatorState::Running {
            return Err(Error::EditConflict { order: id });
        }
        self.orders
            .try_write()
            .map_err(|_| Error::EditConflict { order: id })
    }

    fn lock_validation_errors(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(OrderId, ValidationError)>> {
        self.validation_errors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn find_order<'a>(
    orders: &'a mut [StandingOrder],
    id: OrderId,
) -> Result<&'a mut StandingOrder> {
    orders
        .iter_mut()
        .find(|o| o.id() == id)
        .ok_or(Error::OrderNotFound { order: id })
}
