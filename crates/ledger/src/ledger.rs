//! Inventory ledger trait and reservation outcomes.

use async_trait::async_trait;
use common::{Money, ProductId};

use crate::error::Result;

/// Outcome of a reservation attempt.
///
/// Only `Reserved` changes stock. The other variants are definitive
/// business answers, not transport failures, and must never be retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Stock was decremented. Carries the unit price captured in the same
    /// atomic update, to be frozen into the order line.
    Reserved {
        /// Price per unit at the moment of reservation.
        unit_price: Money,
    },

    /// Not enough stock; nothing was decremented.
    InsufficientStock {
        /// Units available at the time of the attempt.
        available: u32,
    },

    /// The product is not known to the ledger.
    NotFound,
}

impl ReservationOutcome {
    /// Returns true if stock was actually reserved.
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved { .. })
    }
}

/// Trait for inventory ledger operations.
///
/// Implementations must make `try_reserve` a single indivisible
/// compare-and-decrement: "decrement stock by `quantity` only if current
/// stock >= `quantity`". A read-modify-write sequence observable by
/// concurrent callers violates the no-oversell guarantee.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Attempts to reserve `quantity` units of `product_id`.
    async fn try_reserve(&self, product_id: &ProductId, quantity: u32)
    -> Result<ReservationOutcome>;

    /// Returns `quantity` units of `product_id` to stock.
    ///
    /// Compensating operation for a prior successful `try_reserve`. Safe to
    /// retry: the increment is unconditional and releases are commutative.
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()>;
}
