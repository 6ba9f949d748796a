//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::{OrderId, UserId};
use ledger::InventoryLedger;
use orchestrator::{CreateOrderRequest, InMemoryUserDirectory, LineItem, OrderOrchestrator};
use serde::{Deserialize, Serialize};
use store::{Order, OrderStore, Outbox};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<L: InventoryLedger, S: OrderStore, O: Outbox> {
    pub orchestrator: OrderOrchestrator<InMemoryUserDirectory, L, S, O>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub ledger: Arc<L>,
    pub store: Arc<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderBody {
    pub user_id: uuid::Uuid,
    pub items: Vec<LineItemRequest>,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: uuid::Uuid,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_amount_cents: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

fn order_to_response(order: &Order) -> OrderResponse {
    OrderResponse {
        id: order.id.to_string(),
        user_id: order.user_id.to_string(),
        status: order.status.to_string(),
        lines: order
            .lines
            .iter()
            .map(|line| OrderLineResponse {
                product_id: line.product_id.to_string(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_snapshot.cents(),
                subtotal_cents: line.subtotal().cents(),
            })
            .collect(),
        total_amount_cents: order.total_amount.cents(),
        created_at: order.created_at.to_rfc3339(),
    }
}

// -- Handlers --

/// POST /orders — run the order-creation saga.
///
/// The idempotency key comes from the `Idempotency-Key` header and is
/// required: a retried request with the same key returns the original
/// confirmed order instead of creating a second one.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create<L, S, O>(
    State(state): State<Arc<AppState<L, S, O>>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    O: Outbox + 'static,
{
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::BadRequest("Idempotency-Key header is required".to_string())
        })?;

    let request = CreateOrderRequest::new(
        idempotency_key,
        UserId::from_uuid(body.user_id),
        body.items
            .into_iter()
            .map(|item| LineItem::new(item.product_id, item.quantity))
            .collect(),
    );

    // Run the saga on its own task. If the client disconnects mid-request
    // the saga still runs to completion, so compensation is never
    // abandoned halfway.
    let task_state = state.clone();
    let order = tokio::spawn(async move { task_state.orchestrator.create_order(request).await })
        .await
        .map_err(|e| ApiError::Internal(format!("order task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(order_to_response(&order))))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<L, S, O>(
    State(state): State<Arc<AppState<L, S, O>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    O: Outbox + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order_to_response(&order)))
}

/// GET /orders?user_id=... — list a user's orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<L, S, O>(
    State(state): State<Arc<AppState<L, S, O>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    O: Outbox + 'static,
{
    let orders = state
        .store
        .list_for_user(UserId::from_uuid(params.user_id))
        .await?;

    Ok(Json(orders.iter().map(order_to_response).collect()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
