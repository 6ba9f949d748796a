//! Outbox entry types.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type for a newly created order.
pub const EVENT_ORDER_CREATED: &str = "order.created";

/// Unique identifier for an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxEntryId(Uuid);

impl OutboxEntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OutboxEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OutboxEntryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Delivery lifecycle of an outbox entry.
///
/// Only the asynchronous drain moves an entry out of `Pending`; the
/// synchronous order path never touches delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Awaiting delivery to the event bus.
    #[default]
    Pending,

    /// Published successfully (terminal state).
    Delivered,

    /// Gave up after the attempt ceiling (terminal state, operator-visible).
    DeadLettered,
}

impl DeliveryState {
    /// Returns the state name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Delivered => "delivered",
            DeliveryState::DeadLettered => "dead_lettered",
        }
    }

    /// Parses a state from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryState::Pending),
            "delivered" => Some(DeliveryState::Delivered),
            "dead_lettered" => Some(DeliveryState::DeadLettered),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable domain event awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Entry identity.
    pub id: OutboxEntryId,

    /// The order this event describes.
    pub order_id: OrderId,

    /// Event type, e.g. [`EVENT_ORDER_CREATED`].
    pub event_type: String,

    /// Snapshot of the order fields at commit time.
    pub payload: serde_json::Value,

    /// Delivery lifecycle state.
    pub delivery_state: DeliveryState,

    /// Number of failed delivery attempts so far.
    pub attempt_count: u32,

    /// When the entry was enqueued.
    pub created_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Creates a new pending entry.
    pub fn new(order_id: OrderId, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: OutboxEntryId::new(),
            order_id,
            event_type: event_type.into(),
            payload,
            delivery_state: DeliveryState::Pending,
            attempt_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Creates a pending `order.created` entry.
    pub fn order_created(order_id: OrderId, payload: serde_json::Value) -> Self {
        Self::new(order_id, EVENT_ORDER_CREATED, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_pending() {
        let entry = OutboxEntry::order_created(OrderId::new(), serde_json::json!({"x": 1}));
        assert_eq!(entry.delivery_state, DeliveryState::Pending);
        assert_eq!(entry.attempt_count, 0);
        assert_eq!(entry.event_type, EVENT_ORDER_CREATED);
    }

    #[test]
    fn test_delivery_state_parse_roundtrip() {
        for state in [
            DeliveryState::Pending,
            DeliveryState::Delivered,
            DeliveryState::DeadLettered,
        ] {
            assert_eq!(DeliveryState::parse(state.as_str()), Some(state));
        }
        assert_eq!(DeliveryState::parse("lost"), None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let entry = OutboxEntry::order_created(OrderId::new(), serde_json::json!({"total": 42}));
        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: OutboxEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, deserialized);
    }
}
