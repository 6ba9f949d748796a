//! Ephemeral reservation attempt tracking.

use common::{Money, ProductId};
use store::OrderLine;

use crate::request::LineItem;

/// Outcome of one line's reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Not yet attempted.
    NotAttempted,

    /// Reserved; carries the price snapshot to freeze into the order line.
    Reserved {
        /// Unit price captured by the ledger.
        unit_price: Money,
    },

    /// Attempted and refused (insufficient stock or unknown product).
    Failed,
}

#[derive(Debug, Clone)]
struct AttemptedLine {
    product_id: ProductId,
    quantity: u32,
    outcome: LineOutcome,
}

/// Ledger of what one order-creation attempt has reserved so far.
///
/// Exists only for the duration of a single `create_order` call and is
/// never persisted. Its one job is knowing exactly what to compensate on
/// partial failure.
#[derive(Debug, Clone)]
pub struct ReservationAttempt {
    lines: Vec<AttemptedLine>,
}

impl ReservationAttempt {
    /// Creates an attempt covering the given items, all not yet attempted.
    pub fn new(items: &[LineItem]) -> Self {
        Self {
            lines: items
                .iter()
                .map(|item| AttemptedLine {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    outcome: LineOutcome::NotAttempted,
                })
                .collect(),
        }
    }

    /// Records a successful reservation for the line at `index`.
    pub fn mark_reserved(&mut self, index: usize, unit_price: Money) {
        if let Some(line) = self.lines.get_mut(index) {
            line.outcome = LineOutcome::Reserved { unit_price };
        }
    }

    /// Records a refused reservation for the line at `index`.
    pub fn mark_failed(&mut self, index: usize) {
        if let Some(line) = self.lines.get_mut(index) {
            line.outcome = LineOutcome::Failed;
        }
    }

    /// Returns `(product_id, quantity)` for every reserved line. This is
    /// exactly the set of releases compensation must perform.
    pub fn reserved(&self) -> impl Iterator<Item = (&ProductId, u32)> {
        self.lines.iter().filter_map(|line| match line.outcome {
            LineOutcome::Reserved { .. } => Some((&line.product_id, line.quantity)),
            _ => None,
        })
    }

    /// Returns the number of reserved lines.
    pub fn reserved_count(&self) -> usize {
        self.reserved().count()
    }

    /// Builds frozen order lines from the reserved entries, preserving
    /// caller order.
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .filter_map(|line| match line.outcome {
                LineOutcome::Reserved { unit_price } => Some(OrderLine::new(
                    line.product_id.clone(),
                    line.quantity,
                    unit_price,
                )),
                _ => None,
            })
            .collect()
    }

    /// Running total over the reserved lines' price snapshots.
    pub fn total(&self) -> Money {
        self.order_lines().iter().map(OrderLine::subtotal).sum()
    }
}
