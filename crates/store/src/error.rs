//! Store error types.

use common::OrderId;
use thiserror::Error;

use crate::outbox::OutboxEntryId;
use crate::status::OrderStatus;

/// Errors that can occur in the order store and outbox.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with the same ID already exists. IDs are high-entropy
    /// orchestrator-generated values, so this signals an ID-generation
    /// defect and is never retried.
    #[error("Order {0} already exists")]
    Conflict(OrderId),

    /// Another order already holds this idempotency key. Signals a lost
    /// race between two replays of the same request; the caller should
    /// load the winner by key instead of retrying the insert.
    #[error("Idempotency key already taken: {0}")]
    IdempotencyKeyTaken(String),

    /// A status transition found the row in an unexpected status.
    #[error("Stale state for order {order_id}: expected {expected}")]
    StaleState {
        order_id: OrderId,
        expected: OrderStatus,
    },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The outbox entry does not exist.
    #[error("Outbox entry not found: {0}")]
    EntryNotFound(OutboxEntryId),

    /// The store could not be reached (transient, retryable).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
