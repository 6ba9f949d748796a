//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, OrderId, UserId};
use sqlx::PgPool;
use store::{
    DeliveryState, Order, OrderLine, OrderStatus, OrderStore, Outbox, OutboxEntry,
    PostgresOrderStore, PostgresOutbox, StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!("../../../migrations/001_create_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store and outbox with their own pool and cleared tables
async fn get_test_store() -> (PostgresOrderStore, PostgresOutbox) {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE orders, outbox")
        .execute(&pool)
        .await
        .unwrap();

    (PostgresOrderStore::new(pool.clone()), PostgresOutbox::new(pool))
}

fn sample_order(key: &str) -> Order {
    Order::new(
        OrderId::new(),
        UserId::new(),
        key,
        vec![
            OrderLine::new("SKU-A", 2, Money::from_cents(1000)),
            OrderLine::new("SKU-B", 1, Money::from_cents(2500)),
        ],
    )
}

#[tokio::test]
async fn insert_and_load_roundtrip() {
    let (store, _) = get_test_store().await;
    let order = sample_order("key-1");

    store.insert(&order).await.unwrap();

    let loaded = store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.idempotency_key, "key-1");
    assert_eq!(loaded.total_amount, Money::from_cents(4500));
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.lines, order.lines);
}

#[tokio::test]
async fn duplicate_id_maps_to_conflict() {
    let (store, _) = get_test_store().await;
    let order = sample_order("key-1");
    store.insert(&order).await.unwrap();

    let mut dup = sample_order("key-2");
    dup.id = order.id;
    let result = store.insert(&dup).await;

    assert!(matches!(result, Err(StoreError::Conflict(id)) if id == order.id));
}

#[tokio::test]
async fn duplicate_key_maps_to_idempotency_key_taken() {
    let (store, _) = get_test_store().await;
    store.insert(&sample_order("key-1")).await.unwrap();

    let result = store.insert(&sample_order("key-1")).await;

    assert!(matches!(
        result,
        Err(StoreError::IdempotencyKeyTaken(ref key)) if key == "key-1"
    ));
}

#[tokio::test]
async fn update_status_enforces_expected_from() {
    let (store, _) = get_test_store().await;
    let order = sample_order("key-1");
    store.insert(&order).await.unwrap();

    store
        .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
        .await
        .unwrap();

    // Second transition from Pending must see the stale guard.
    let result = store
        .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
        .await;
    assert!(matches!(result, Err(StoreError::StaleState { .. })));

    let loaded = store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn update_status_of_missing_order_reports_not_found() {
    let (store, _) = get_test_store().await;

    let result = store
        .update_status(OrderId::new(), OrderStatus::Pending, OrderStatus::Confirmed)
        .await;

    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
async fn find_by_idempotency_key() {
    let (store, _) = get_test_store().await;
    let order = sample_order("key-42");
    store.insert(&order).await.unwrap();

    let found = store.find_by_idempotency_key("key-42").await.unwrap();
    assert_eq!(found.map(|o| o.id), Some(order.id));

    let missing = store.find_by_idempotency_key("key-404").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn list_for_user_returns_oldest_first() {
    let (store, _) = get_test_store().await;
    let user_id = UserId::new();

    let mut first = sample_order("key-1");
    first.user_id = user_id;
    let mut second = sample_order("key-2");
    second.user_id = user_id;
    second.created_at = second.created_at + chrono::Duration::seconds(1);
    store.insert(&first).await.unwrap();
    store.insert(&second).await.unwrap();
    store.insert(&sample_order("key-3")).await.unwrap();

    let orders = store.list_for_user(user_id).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, first.id);
    assert_eq!(orders[1].id, second.id);
}

#[tokio::test]
async fn list_confirmed_filters_by_status() {
    let (store, _) = get_test_store().await;
    let order = sample_order("key-1");
    store.insert(&order).await.unwrap();
    store.insert(&sample_order("key-2")).await.unwrap();

    store
        .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
        .await
        .unwrap();

    let confirmed = store.list_confirmed().await.unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, order.id);
}

#[tokio::test]
async fn outbox_delivery_lifecycle() {
    let (_, outbox) = get_test_store().await;
    let order_id = OrderId::new();
    let entry = OutboxEntry::order_created(order_id, serde_json::json!({"total": 4500}));
    let entry_id = entry.id;

    outbox.enqueue(entry).await.unwrap();
    assert!(outbox.has_entry_for(order_id).await.unwrap());

    let pending = outbox.next_pending().await.unwrap().unwrap();
    assert_eq!(pending.id, entry_id);
    assert_eq!(pending.delivery_state, DeliveryState::Pending);
    assert_eq!(pending.payload["total"], 4500);

    assert_eq!(outbox.mark_failed(entry_id).await.unwrap(), 1);
    assert_eq!(outbox.mark_failed(entry_id).await.unwrap(), 2);

    outbox.mark_delivered(entry_id).await.unwrap();
    assert!(outbox.next_pending().await.unwrap().is_none());
}

#[tokio::test]
async fn outbox_dead_letter_removes_from_pending() {
    let (_, outbox) = get_test_store().await;
    let order_id = OrderId::new();
    let entry = OutboxEntry::order_created(order_id, serde_json::json!({}));
    let entry_id = entry.id;
    outbox.enqueue(entry).await.unwrap();

    outbox.mark_dead_lettered(entry_id).await.unwrap();

    assert!(outbox.next_pending().await.unwrap().is_none());
    // Still counts as present for the reconciliation sweep.
    assert!(outbox.has_entry_for(order_id).await.unwrap());
}

#[tokio::test]
async fn outbox_next_pending_returns_oldest() {
    let (_, outbox) = get_test_store().await;

    let first = OutboxEntry::order_created(OrderId::new(), serde_json::json!({"n": 1}));
    let first_id = first.id;
    outbox.enqueue(first).await.unwrap();

    let mut second = OutboxEntry::order_created(OrderId::new(), serde_json::json!({"n": 2}));
    second.created_at = second.created_at + chrono::Duration::seconds(1);
    outbox.enqueue(second).await.unwrap();

    let pending = outbox.next_pending().await.unwrap().unwrap();
    assert_eq!(pending.id, first_id);
}

#[tokio::test]
async fn outbox_marks_on_unknown_entry_report_not_found() {
    let (_, outbox) = get_test_store().await;
    let ghost = OutboxEntry::order_created(OrderId::new(), serde_json::json!({})).id;

    assert!(matches!(
        outbox.mark_delivered(ghost).await,
        Err(StoreError::EntryNotFound(_))
    ));
    assert!(matches!(
        outbox.mark_failed(ghost).await,
        Err(StoreError::EntryNotFound(_))
    ));
    assert!(matches!(
        outbox.mark_dead_lettered(ghost).await,
        Err(StoreError::EntryNotFound(_))
    ));
}
