//! Order store and outbox traits.

use async_trait::async_trait;
use common::{OrderId, UserId};

use crate::error::Result;
use crate::order::Order;
use crate::outbox::{OutboxEntry, OutboxEntryId};
use crate::status::OrderStatus;

/// Durable storage for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically inserts a new order row.
    ///
    /// Fails with `Conflict` if the ID already exists and with
    /// `IdempotencyKeyTaken` if another order holds the same key.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Atomically transitions an order's status.
    ///
    /// Fails with `StaleState` if the row is no longer in `from`, which
    /// guards against double-processing the same order.
    async fn update_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<()>;

    /// Loads an order by ID.
    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads the order holding the given idempotency key, if any.
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>>;

    /// Lists all orders placed by a user, oldest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Lists all confirmed orders (reconciliation sweep input).
    async fn list_confirmed(&self) -> Result<Vec<Order>>;
}

/// Durable queue of domain events awaiting asynchronous delivery.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Durably enqueues an entry for later delivery.
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()>;

    /// Returns the oldest pending entry, if any.
    async fn next_pending(&self) -> Result<Option<OutboxEntry>>;

    /// Marks an entry as delivered.
    async fn mark_delivered(&self, id: OutboxEntryId) -> Result<()>;

    /// Records a failed delivery attempt, returning the new attempt count.
    /// The entry stays pending; the drain decides when to dead-letter.
    async fn mark_failed(&self, id: OutboxEntryId) -> Result<u32>;

    /// Moves an entry to the dead letter state.
    async fn mark_dead_lettered(&self, id: OutboxEntryId) -> Result<()>;

    /// Returns true if any entry (in any delivery state) exists for the
    /// given order.
    async fn has_entry_for(&self, order_id: OrderId) -> Result<bool>;
}
