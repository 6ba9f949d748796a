//! Asynchronous outbox delivery.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use store::Outbox;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Topic that carries order lifecycle events.
pub const TOPIC_ORDER_EVENTS: &str = "order_events";

/// Delivery attempts before an entry is dead-lettered.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Errors from the event bus.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus rejected or could not accept the event.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
}

/// Downstream event bus the drain publishes to.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event to a topic. At-least-once: callers may retry,
    /// so consumers must deduplicate on payload identity.
    async fn publish(
        &self,
        topic: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), PublishError>;
}

/// An event as observed by the in-memory bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    /// Topic the event was published to.
    pub topic: String,

    /// Event type, e.g. `order.created`.
    pub event_type: String,

    /// Event payload.
    pub payload: Value,
}

#[derive(Debug, Default)]
struct BusState {
    published: Vec<PublishedEvent>,
    fail_publishes: bool,
}

/// In-memory event bus for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<BusState>>,
}

impl InMemoryEventBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every publish to fail.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.state.write().unwrap().fail_publishes = fail;
    }

    /// Returns all events published so far, in order.
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the number of published events.
    pub fn published_count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(
        &self,
        topic: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap();

        if state.fail_publishes {
            return Err(PublishError::Unavailable("bus offline".to_string()));
        }

        state.published.push(PublishedEvent {
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Background worker that delivers pending outbox entries.
///
/// Each pass drains oldest-first. An entry that fails delivery stays
/// pending with its attempt count incremented; once the count reaches
/// [`MAX_DELIVERY_ATTEMPTS`] the entry is dead-lettered so the rest of the
/// queue is not blocked behind a poison entry.
pub struct OutboxDrain<O, P> {
    outbox: Arc<O>,
    publisher: Arc<P>,
    poll_interval: Duration,
}

impl<O, P> OutboxDrain<O, P>
where
    O: Outbox,
    P: EventPublisher,
{
    /// Creates a drain polling at the given interval.
    pub fn new(outbox: Arc<O>, publisher: Arc<P>, poll_interval: Duration) -> Self {
        Self {
            outbox,
            publisher,
            poll_interval,
        }
    }

    /// Runs one delivery pass and returns the number of entries delivered.
    ///
    /// The pass ends when the queue is empty or when the oldest pending
    /// entry is one this pass already failed on, so a struggling bus does
    /// not spin the loop.
    pub async fn run_once(&self) -> store::Result<u32> {
        let mut delivered = 0u32;
        let mut failed_this_pass = HashSet::new();

        while let Some(entry) = self.outbox.next_pending().await? {
            if failed_this_pass.contains(&entry.id) {
                break;
            }

            match self
                .publisher
                .publish(TOPIC_ORDER_EVENTS, &entry.event_type, &entry.payload)
                .await
            {
                Ok(()) => {
                    self.outbox.mark_delivered(entry.id).await?;
                    metrics::counter!("outbox_delivered_total").increment(1);
                    debug!(entry_id = %entry.id, order_id = %entry.order_id, "Delivered outbox entry");
                    delivered += 1;
                }
                Err(error) => {
                    let attempts = self.outbox.mark_failed(entry.id).await?;
                    metrics::counter!("outbox_delivery_failures_total").increment(1);
                    warn!(
                        entry_id = %entry.id,
                        order_id = %entry.order_id,
                        attempts,
                        %error,
                        "Outbox delivery failed"
                    );

                    if attempts >= MAX_DELIVERY_ATTEMPTS {
                        self.outbox.mark_dead_lettered(entry.id).await?;
                        metrics::counter!("outbox_dead_lettered_total").increment(1);
                        error!(
                            entry_id = %entry.id,
                            order_id = %entry.order_id,
                            "Outbox entry dead-lettered after {attempts} attempts"
                        );
                    } else {
                        failed_this_pass.insert(entry.id);
                    }
                }
            }
        }

        Ok(delivered)
    }

    /// Runs delivery passes on the poll interval until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Outbox drain started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.run_once().await {
                        error!(%error, "Outbox drain pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Outbox drain stopping");
                    break;
                }
            }
        }
    }
}
