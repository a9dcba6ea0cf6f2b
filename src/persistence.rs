//! Persistence contract and in-memory reference implementation.
//!
//! The core owns in-memory copies of its standing orders and explicitly
//! loads and saves them through [`PersistenceContext`]; there is no
//! implicit autosave or context-wide dirty tracking. Failures surface as
//! `Persistence` errors and abort the current operation without partial
//! writes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::order::{OrderId, StandingOrder};
use crate::core::selection::AccountSelectionSet;
use crate::errors::Result;

/// Load/save contract for standing orders.
#[async_trait]
pub trait PersistenceContext: Send + Sync {
    /// Loads all standing orders whose account is in `scope`.
    async fn load_standing_orders(
        &self,
        scope: &AccountSelectionSet,
    ) -> Result<Vec<StandingOrder>>;

    /// Persists one order (cycle, limits, and bookkeeping included).
    async fn save_order(&self, order: &StandingOrder) -> Result<()>;
}

/// In-memory persistence backed by a map, usable as a default store and
/// as a test double.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    orders: RwLock<BTreeMap<OrderId, StandingOrder>>,
}

impl InMemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing orders.
    pub async fn seed<I>(&self, orders: I)
    where
        I: IntoIterator<Item = StandingOrder>,
    {
        let mut guard = self.orders.write().await;
        for order in orders {
            guard.insert(order.id(), order);
        }
    }

    /// Returns a snapshot of one stored order.
    pub async fn get(&self, id: OrderId) -> Option<StandingOrder> {
        self.orders.read().await.get(&id).cloned()
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl PersistenceContext for InMemoryPersistence {
    async fn load_standing_orders(
        &self,
        scope: &AccountSelectionSet,
    ) -> Result<Vec<StandingOrder>> {
        let guard = self.orders.read().await;
        let orders: Vec<StandingOrder> = guard
            .values()
            .filter(|order| scope.contains(order.account()))
            .cloned()
            .collect();
        debug!(count = orders.len(), "loaded standing orders");
        Ok(orders)
    }

    async fn save_order(&self, order: &StandingOrder) -> Result<()> {
        debug!(order = %order.id(), "saving standing order");
        self.orders.write().await.insert(order.id(), order.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::order::AccountId;
    use crate::test_utils::{order_for_account, test_limits};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_load_filters_by_selection() {
        let store = InMemoryPersistence::new();
        store
            .seed(vec![
                order_for_account(1, "DE01", test_limits(date(2024, 1, 1), None), dec!(50)),
                order_for_account(2, "DE02", test_limits(date(2024, 1, 1), None), dec!(60)),
                order_for_account(3, "DE01", test_limits(date(2024, 1, 1), None), dec!(70)),
            ])
            .await;

        let scope =
            AccountSelectionSet::new(vec![AccountId("DE01".to_string())]).unwrap();
        let loaded = store.load_standing_orders(&scope).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|o| o.account().0 == "DE01"));
    }

    #[tokio::test]
    async fn test_save_round_trips_bookkeeping() {
        let store = InMemoryPersistence::new();
        let mut order =
            order_for_account(7, "DE01", test_limits(date(2024, 1, 1), None), dec!(50));
        order.mark_executed(date(2024, 1, 15));
        store.save_order(&order).await.unwrap();

        let loaded = store.get(OrderId(7)).await.unwrap();
        assert_eq!(loaded.last_executed(), Some(date(2024, 1, 15)));
        assert_eq!(loaded.next_due(), order.next_due());
    }
}
