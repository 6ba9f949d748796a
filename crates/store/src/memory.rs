//! In-memory order store and outbox for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};

use crate::error::{Result, StoreError};
use crate::order::Order;
use crate::outbox::{DeliveryState, OutboxEntry, OutboxEntryId};
use crate::status::OrderStatus;
use crate::store::{OrderStore, Outbox};

#[derive(Debug, Default)]
struct InMemoryOrderStoreState {
    orders: HashMap<OrderId, Order>,
    fail_inserts: bool,
    fail_updates: bool,
}

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderStoreState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `insert` to fail with `Unavailable`.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.state.write().unwrap().fail_inserts = fail;
    }

    /// Configures `update_status` to fail with `Unavailable`.
    pub fn set_fail_updates(&self, fail: bool) {
        self.state.write().unwrap().fail_updates = fail;
    }

    /// Returns the number of stored orders.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_inserts {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }

        if state.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(order.id));
        }

        if state
            .orders
            .values()
            .any(|o| o.idempotency_key == order.idempotency_key)
        {
            return Err(StoreError::IdempotencyKeyTaken(
                order.idempotency_key.clone(),
            ));
        }

        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_updates {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if order.status != from {
            return Err(StoreError::StaleState {
                order_id,
                expected: from,
            });
        }

        order.status = to;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().unwrap().orders.get(&order_id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .orders
            .values()
            .find(|o| o.idempotency_key == key)
            .cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().unwrap();
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn list_confirmed(&self) -> Result<Vec<Order>> {
        let state = self.state.read().unwrap();
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Confirmed)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}

#[derive(Debug, Default)]
struct InMemoryOutboxState {
    entries: Vec<OutboxEntry>,
    fail_enqueue: bool,
}

/// In-memory outbox.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutbox {
    state: Arc<RwLock<InMemoryOutboxState>>,
}

impl InMemoryOutbox {
    /// Creates a new empty in-memory outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `enqueue` to fail with `Unavailable`.
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.state.write().unwrap().fail_enqueue = fail;
    }

    /// Returns all entries for an order, oldest first.
    pub fn entries_for(&self, order_id: OrderId) -> Vec<OutboxEntry> {
        self.state
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Returns the number of entries in the given delivery state.
    pub fn count_in_state(&self, state: DeliveryState) -> usize {
        self.state
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.delivery_state == state)
            .count()
    }
}

#[async_trait]
impl Outbox for InMemoryOutbox {
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_enqueue {
            return Err(StoreError::Unavailable("outbox offline".to_string()));
        }

        state.entries.push(entry);
        Ok(())
    }

    async fn next_pending(&self) -> Result<Option<OutboxEntry>> {
        let state = self.state.read().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.delivery_state == DeliveryState::Pending)
            .min_by_key(|e| e.created_at)
            .cloned())
    }

    async fn mark_delivered(&self, id: OutboxEntryId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;
        entry.delivery_state = DeliveryState::Delivered;
        Ok(())
    }

    async fn mark_failed(&self, id: OutboxEntryId) -> Result<u32> {
        let mut state = self.state.write().unwrap();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;
        entry.attempt_count += 1;
        Ok(entry.attempt_count)
    }

    async fn mark_dead_lettered(&self, id: OutboxEntryId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;
        entry.delivery_state = DeliveryState::DeadLettered;
        Ok(())
    }

    async fn has_entry_for(&self, order_id: OrderId) -> Result<bool> {
        Ok(self
            .state
            .read()
            .unwrap()
            .entries
            .iter()
            .any(|e| e.order_id == order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderLine;
    use common::Money;

    fn sample_order(key: &str) -> Order {
        Order::new(
            OrderId::new(),
            UserId::new(),
            key,
            vec![OrderLine::new("SKU-A", 1, Money::from_cents(1000))],
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("key-1");

        store.insert(&order).await.unwrap();

        let loaded = store.get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_conflicts() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("key-1");
        store.insert(&order).await.unwrap();

        let mut dup = sample_order("key-2");
        dup.id = order.id;
        let result = store.insert(&dup).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_insert_duplicate_key_rejected() {
        let store = InMemoryOrderStore::new();
        store.insert(&sample_order("key-1")).await.unwrap();

        let result = store.insert(&sample_order("key-1")).await;
        assert!(matches!(result, Err(StoreError::IdempotencyKeyTaken(_))));
    }

    #[tokio::test]
    async fn test_update_status_guard() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("key-1");
        store.insert(&order).await.unwrap();

        store
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();

        // Second transition from Pending must now fail.
        let result = store
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await;
        assert!(matches!(result, Err(StoreError::StaleState { .. })));

        let loaded = store.get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_find_by_idempotency_key() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("key-42");
        store.insert(&order).await.unwrap();

        let found = store.find_by_idempotency_key("key-42").await.unwrap();
        assert_eq!(found.map(|o| o.id), Some(order.id));

        let missing = store.find_by_idempotency_key("key-404").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let store = InMemoryOrderStore::new();
        let user_id = UserId::new();

        let mut o1 = sample_order("key-1");
        o1.user_id = user_id;
        let mut o2 = sample_order("key-2");
        o2.user_id = user_id;
        store.insert(&o1).await.unwrap();
        store.insert(&o2).await.unwrap();
        store.insert(&sample_order("key-3")).await.unwrap();

        let orders = store.list_for_user(user_id).await.unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn test_list_confirmed() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("key-1");
        store.insert(&order).await.unwrap();
        store.insert(&sample_order("key-2")).await.unwrap();

        store
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();

        let confirmed = store.list_confirmed().await.unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, order.id);
    }

    #[tokio::test]
    async fn test_outbox_lifecycle() {
        let outbox = InMemoryOutbox::new();
        let order_id = OrderId::new();
        let entry = OutboxEntry::order_created(order_id, serde_json::json!({"total": 1}));
        let entry_id = entry.id;

        outbox.enqueue(entry).await.unwrap();
        assert!(outbox.has_entry_for(order_id).await.unwrap());

        let pending = outbox.next_pending().await.unwrap().unwrap();
        assert_eq!(pending.id, entry_id);

        assert_eq!(outbox.mark_failed(entry_id).await.unwrap(), 1);
        assert_eq!(outbox.mark_failed(entry_id).await.unwrap(), 2);

        outbox.mark_delivered(entry_id).await.unwrap();
        assert!(outbox.next_pending().await.unwrap().is_none());
        assert_eq!(outbox.count_in_state(DeliveryState::Delivered), 1);
    }

    #[tokio::test]
    async fn test_outbox_dead_letter() {
        let outbox = InMemoryOutbox::new();
        let entry = OutboxEntry::order_created(OrderId::new(), serde_json::json!({}));
        let entry_id = entry.id;
        outbox.enqueue(entry).await.unwrap();

        outbox.mark_dead_lettered(entry_id).await.unwrap();
        assert!(outbox.next_pending().await.unwrap().is_none());
        assert_eq!(outbox.count_in_state(DeliveryState::DeadLettered), 1);
    }

    #[tokio::test]
    async fn test_next_pending_returns_oldest() {
        let outbox = InMemoryOutbox::new();
        let first = OutboxEntry::order_created(OrderId::new(), serde_json::json!({"n": 1}));
        let first_id = first.id;
        outbox.enqueue(first).await.unwrap();

        let mut second = OutboxEntry::order_created(OrderId::new(), serde_json::json!({"n": 2}));
        second.created_at = second.created_at + chrono::Duration::seconds(1);
        outbox.enqueue(second).await.unwrap();

        let pending = outbox.next_pending().await.unwrap().unwrap();
        assert_eq!(pending.id, first_id);
    }
}
