//! Backlog of failed compensating releases.

use std::sync::{Arc, Mutex};

use common::ProductId;

/// A release that could not be performed when compensation ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelease {
    /// The product whose stock is still held.
    pub product_id: ProductId,

    /// Units to return.
    pub quantity: u32,
}

/// Shared queue of releases awaiting retry by the reconciliation sweep.
///
/// A stuck release under-sells rather than over-sells, so it never blocks
/// the caller's response; it lands here and is retried out of band until
/// it goes through.
#[derive(Debug, Clone, Default)]
pub struct ReleaseBacklog {
    state: Arc<Mutex<Vec<PendingRelease>>>,
}

impl ReleaseBacklog {
    /// Creates a new empty backlog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a release that must eventually be retried.
    pub fn push(&self, product_id: ProductId, quantity: u32) {
        self.state.lock().unwrap().push(PendingRelease {
            product_id,
            quantity,
        });
    }

    /// Takes all pending releases, leaving the backlog empty.
    pub fn drain(&self) -> Vec<PendingRelease> {
        std::mem::take(&mut *self.state.lock().unwrap())
    }

    /// Returns the number of pending releases.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    /// Returns true if there is nothing to retry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
