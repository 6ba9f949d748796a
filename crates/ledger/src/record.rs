//! Inventory record type.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A single product's stock entry in the ledger.
///
/// `stock_quantity` is never negative: every mutation goes through an
/// atomic conditional update, never a read-then-write pair visible to
/// other operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// The product this record tracks (unique).
    pub product_id: ProductId,

    /// Units currently available for reservation.
    pub stock_quantity: u32,

    /// Current unit price; snapshotted into the order line at reservation.
    pub unit_price: Money,

    /// Row version, bumped on every mutation.
    pub version: u64,

    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Creates a new record with the given stock and price.
    pub fn new(product_id: impl Into<ProductId>, stock_quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            stock_quantity,
            unit_price,
            version: 0,
            updated_at: Utc::now(),
        }
    }
}
