//! Order-creation request types and field validation.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{CreateOrderError, Result};

/// One requested line item: product and quantity, no price. Prices are
/// snapshotted by the ledger at reservation time, not supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product to order.
    pub product_id: ProductId,

    /// Quantity to order (> 0).
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Caller-supplied token identifying this request across retries.
    pub idempotency_key: String,

    /// The purchasing user.
    pub user_id: UserId,

    /// Line items in caller-chosen order. The order matters only for
    /// deterministic compensation, not business meaning.
    pub items: Vec<LineItem>,
}

impl CreateOrderRequest {
    /// Creates a new request.
    pub fn new(
        idempotency_key: impl Into<String>,
        user_id: UserId,
        items: Vec<LineItem>,
    ) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            user_id,
            items,
        }
    }

    /// Validates request shape. Runs before any remote call, so a failure
    /// here is guaranteed side-effect free.
    pub fn validate(&self) -> Result<()> {
        if self.idempotency_key.trim().is_empty() {
            return Err(CreateOrderError::InvalidLineItem(
                "idempotency key must not be empty".to_string(),
            ));
        }

        if self.items.is_empty() {
            return Err(CreateOrderError::InvalidLineItem(
                "order must contain at least one line item".to_string(),
            ));
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(CreateOrderError::InvalidLineItem(format!(
                    "quantity for product {} must be greater than zero",
                    item.product_id
                )));
            }
        }

        Ok(())
    }
}
