//! Order-creation orchestration.
//!
//! This crate drives the multi-step saga that turns three fallible remote
//! calls plus one local write into an operation that is either fully
//! committed or safely abandoned:
//!
//! 1. Validate the purchasing user against the user directory
//! 2. Reserve stock per line item, releasing partial reservations on failure
//! 3. Persist the order atomically
//! 4. Enqueue the `order.created` event in the outbox
//!
//! Event delivery is a separate asynchronous concern: the [`OutboxDrain`]
//! publishes pending entries with retries and dead-lettering, and the
//! [`ReconciliationSweep`] backfills missing outbox entries and retries
//! failed compensating releases.

pub mod attempt;
pub mod backlog;
pub mod drain;
pub mod error;
pub mod events;
pub mod phase;
pub mod request;
pub mod retry;
pub mod saga;
pub mod services;
pub mod sweep;

pub use attempt::{LineOutcome, ReservationAttempt};
pub use backlog::{PendingRelease, ReleaseBacklog};
pub use drain::{
    EventPublisher, InMemoryEventBus, MAX_DELIVERY_ATTEMPTS, OutboxDrain, PublishError,
    PublishedEvent, TOPIC_ORDER_EVENTS,
};
pub use error::CreateOrderError;
pub use events::order_created_payload;
pub use phase::SagaPhase;
pub use request::{CreateOrderRequest, LineItem};
pub use retry::RetryPolicy;
pub use saga::OrderOrchestrator;
pub use services::{DirectoryError, InMemoryUserDirectory, UserDirectory};
pub use sweep::{ReconciliationSweep, SweepReport};
