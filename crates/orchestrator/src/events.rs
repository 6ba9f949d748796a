//! Event payload construction.

use serde_json::{Value, json};
use store::Order;

/// Builds the `order.created` payload from a committed order.
///
/// The payload is a snapshot of the order at commit time. Downstream
/// consumers must not re-read the order row, so everything they need is
/// embedded here.
pub fn order_created_payload(order: &Order) -> Value {
    json!({
        "order_id": order.id,
        "user_id": order.user_id,
        "total_amount_cents": order.total_amount.cents(),
        "status": order.status.as_str(),
        "lines": order.lines,
    })
}
