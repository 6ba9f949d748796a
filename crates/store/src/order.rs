//! Order and order line types.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

/// A single line of an order with its frozen price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The product ordered.
    pub product_id: ProductId,

    /// Quantity ordered (> 0).
    pub quantity: u32,

    /// Price per unit captured at reservation time, immutable thereafter.
    pub unit_price_snapshot: Money,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price_snapshot: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price_snapshot,
        }
    }

    /// Returns the line subtotal (quantity * snapshot price).
    pub fn subtotal(&self) -> Money {
        self.unit_price_snapshot.multiply(self.quantity)
    }
}

/// A durable order record.
///
/// `total_amount` is computed once from the line snapshots at construction
/// and never recomputed from live product prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Orchestrator-generated identity.
    pub id: OrderId,

    /// The purchasing user.
    pub user_id: UserId,

    /// Caller-supplied idempotency key (unique across orders).
    pub idempotency_key: String,

    /// Line items in caller-supplied order.
    pub lines: Vec<OrderLine>,

    /// Sum of frozen line subtotals at creation time.
    pub total_amount: Money,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// When the row was inserted.
    pub created_at: DateTime<Utc>,

    /// When the row was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new `Pending` order, freezing the total from the lines.
    pub fn new(
        id: OrderId,
        user_id: UserId,
        idempotency_key: impl Into<String>,
        lines: Vec<OrderLine>,
    ) -> Self {
        let total_amount = lines.iter().map(OrderLine::subtotal).sum();
        let now = Utc::now();
        Self {
            id,
            user_id,
            idempotency_key: idempotency_key.into(),
            lines,
            total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the number of line items.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}
