//! Order-creation error taxonomy.

use common::{OrderId, ProductId, UserId};
use store::OrderStatus;
use thiserror::Error;

/// Terminal outcomes of a failed order-creation attempt.
///
/// The taxonomy follows the saga's consistency contract:
///
/// - validation errors abort before any side effect;
/// - resource errors abort after full compensation;
/// - dependency errors are retried locally first, then surfaced;
/// - consistency errors always trigger compensation of every reservation;
/// - delivery failures never appear here at all — they are retried
///   asynchronously by the outbox drain.
#[derive(Debug, Error)]
pub enum CreateOrderError {
    /// The purchasing user does not exist. No side effects.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A line item is malformed (zero quantity, empty request, empty key).
    /// No side effects.
    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    /// Not enough stock for the given product. All prior reservations of
    /// this attempt were released.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock {
        /// The product that could not be reserved.
        product_id: ProductId,
    },

    /// The product is unknown to the inventory ledger. Compensated the
    /// same way as insufficient stock, surfaced distinctly.
    #[error("Product not found: {product_id}")]
    ProductNotFound {
        /// The offending product.
        product_id: ProductId,
    },

    /// A dependency stayed unreachable after the retry budget was spent.
    #[error("Dependency unavailable: {component}")]
    DependencyUnavailable {
        /// The component that could not be reached.
        component: &'static str,
    },

    /// The order row could not be inserted or confirmed. Every reservation
    /// was released; the attempt left no stock held.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// The order row was found in an unexpected status mid-transition,
    /// indicating a concurrent processor. Every reservation was released.
    #[error("Stale order state for {0}")]
    StaleOrderState(OrderId),

    /// The generated order ID already exists. IDs are high-entropy, so
    /// this signals an ID-generation defect; never retried.
    #[error("Order ID conflict: {0}")]
    IdConflict(OrderId),

    /// The idempotency key is already held by an order that never reached
    /// `Confirmed`; only confirmed orders are replayed.
    #[error("Idempotency key held by order {order_id} in status {status}")]
    DuplicateRequest {
        /// The order holding the key.
        order_id: OrderId,
        /// Its current status.
        status: OrderStatus,
    },

    /// Unexpected store failure while reading (replay lookup, reload).
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),
}

impl CreateOrderError {
    /// Returns true if the attempt had no effect on stock or storage.
    pub fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            CreateOrderError::UserNotFound(_)
                | CreateOrderError::InvalidLineItem(_)
                | CreateOrderError::DependencyUnavailable {
                    component: "user_directory"
                }
        )
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, CreateOrderError>;
