//! Ledger error types.

use thiserror::Error;

/// Errors that can occur when talking to the inventory ledger.
///
/// Note that an unsuccessful reservation is not an error: insufficient
/// stock and unknown products are reported through
/// [`crate::ReservationOutcome`]. Errors here mean the ledger itself could
/// not be reached or failed internally.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger could not be reached (transient, retryable).
    #[error("Inventory ledger unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
