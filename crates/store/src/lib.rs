//! Durable order storage and outbox for the order system.
//!
//! The order store owns the order table and its lifecycle transitions; the
//! outbox owns the durable queue of domain events awaiting asynchronous
//! delivery. Both are traits with an in-memory implementation (tests,
//! local runs) and a PostgreSQL implementation.

pub mod error;
pub mod memory;
pub mod order;
pub mod outbox;
pub mod postgres;
pub mod status;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryOutbox};
pub use order::{Order, OrderLine};
pub use outbox::{DeliveryState, EVENT_ORDER_CREATED, OutboxEntry, OutboxEntryId};
pub use postgres::{PostgresOrderStore, PostgresOutbox};
pub use status::OrderStatus;
pub use store::{OrderStore, Outbox};
