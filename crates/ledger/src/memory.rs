//! In-memory inventory ledger.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, ProductId};

use crate::error::{LedgerError, Result};
use crate::ledger::{InventoryLedger, ReservationOutcome};
use crate::record::InventoryRecord;

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    records: HashMap<ProductId, InventoryRecord>,
    unavailable: bool,
    fail_releases: bool,
    release_count: u64,
}

/// In-memory inventory ledger for testing and local runs.
///
/// The compare-and-decrement happens under a single write-lock acquisition,
/// giving the same indivisibility as the PostgreSQL backend's conditional
/// `UPDATE`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) a product's stock entry.
    pub fn set_stock(&self, product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) {
        let record = InventoryRecord::new(product_id, quantity, unit_price);
        self.state
            .write()
            .unwrap()
            .records
            .insert(record.product_id.clone(), record);
    }

    /// Returns the current stock for a product, if known.
    pub fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .records
            .get(product_id)
            .map(|r| r.stock_quantity)
    }

    /// Configures the ledger to report `Unavailable` on every call.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Configures `release` to fail (for exercising the release backlog).
    pub fn set_fail_releases(&self, fail: bool) {
        self.state.write().unwrap().fail_releases = fail;
    }

    /// Returns the number of successful releases performed.
    pub fn release_count(&self) -> u64 {
        self.state.read().unwrap().release_count
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn try_reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ReservationOutcome> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(LedgerError::Unavailable("ledger offline".to_string()));
        }

        let Some(record) = state.records.get_mut(product_id) else {
            return Ok(ReservationOutcome::NotFound);
        };

        if record.stock_quantity < quantity {
            return Ok(ReservationOutcome::InsufficientStock {
                available: record.stock_quantity,
            });
        }

        record.stock_quantity -= quantity;
        record.version += 1;
        record.updated_at = Utc::now();

        Ok(ReservationOutcome::Reserved {
            unit_price: record.unit_price,
        })
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.unavailable || state.fail_releases {
            return Err(LedgerError::Unavailable("ledger offline".to_string()));
        }

        match state.records.get_mut(product_id) {
            Some(record) => {
                record.stock_quantity += quantity;
                record.version += 1;
                record.updated_at = Utc::now();
            }
            None => {
                // A release always follows a successful reserve, so an
                // unknown product here points at a caller bug. Tracked but
                // not fatal: the increment has nothing to restore.
                tracing::warn!(%product_id, quantity, "release for unknown product");
            }
        }

        state.release_count += 1;
        Ok(())
    }
}
