//! Inventory ledger for the order system.
//!
//! The ledger owns per-product stock counts and exposes a single pair of
//! operations: an atomic conditional reserve and an idempotent-safe release.
//! `try_reserve` decrements stock only if enough is available, in one
//! indivisible step, so two concurrent reservations can never both succeed
//! when only one has sufficient stock.
//!
//! Two backends share the `InventoryLedger` trait: an in-memory
//! implementation (tests, local runs) and a PostgreSQL implementation whose
//! reserve is a single conditional `UPDATE` statement.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod record;

pub use error::{LedgerError, Result};
pub use ledger::{InventoryLedger, ReservationOutcome};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use record::InventoryRecord;
