//! PostgreSQL-backed order store and outbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::order::{Order, OrderLine};
use crate::outbox::{DeliveryState, OutboxEntry, OutboxEntryId};
use crate::status::OrderStatus;
use crate::store::{OrderStore, Outbox};

fn bad_column(column: &str, value: &str) -> StoreError {
    StoreError::Serialization(serde_json::Error::io(std::io::Error::other(format!(
        "unexpected {column} value: {value}"
    ))))
}

/// PostgreSQL order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let lines: Vec<OrderLine> = serde_json::from_value(row.try_get("lines")?)?;
        let status_raw: String = row.try_get("status")?;
        let status =
            OrderStatus::parse(&status_raw).ok_or_else(|| bad_column("status", &status_raw))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            idempotency_key: row.try_get("idempotency_key")?,
            lines,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            status,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, idempotency_key, lines, total_amount_cents, status, created_at, updated_at";

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert(&self, order: &Order) -> Result<()> {
        let lines = serde_json::to_value(&order.lines)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, idempotency_key, lines, total_amount_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(&order.idempotency_key)
        .bind(lines)
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("orders_pkey") => return StoreError::Conflict(order.id),
                    Some("unique_idempotency_key") => {
                        return StoreError::IdempotencyKeyTaken(order.idempotency_key.clone());
                    }
                    _ => {}
                }
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a stale one.
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1 LIMIT 1")
                    .bind(order_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?;

            return match exists {
                Some(_) => Err(StoreError::StaleState {
                    order_id,
                    expected: from,
                }),
                None => Err(StoreError::OrderNotFound(order_id)),
            };
        }

        Ok(())
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn list_confirmed(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(OrderStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

/// PostgreSQL outbox.
#[derive(Clone)]
pub struct PostgresOutbox {
    pool: PgPool,
}

impl PostgresOutbox {
    /// Creates a new PostgreSQL outbox.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: PgRow) -> Result<OutboxEntry> {
        let state_raw: String = row.try_get("delivery_state")?;
        let delivery_state = DeliveryState::parse(&state_raw)
            .ok_or_else(|| bad_column("delivery_state", &state_raw))?;

        Ok(OutboxEntry {
            id: OutboxEntryId::from(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            delivery_state,
            attempt_count: row.try_get::<i64, _>("attempt_count")? as u32,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl Outbox for PostgresOutbox {
    #[tracing::instrument(skip(self, entry), fields(order_id = %entry.order_id))]
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox (id, order_id, event_type, payload, delivery_state, attempt_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.order_id.as_uuid())
        .bind(&entry.event_type)
        .bind(&entry.payload)
        .bind(entry.delivery_state.as_str())
        .bind(entry.attempt_count as i64)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn next_pending(&self) -> Result<Option<OutboxEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, event_type, payload, delivery_state, attempt_count, created_at
            FROM outbox
            WHERE delivery_state = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }

    async fn mark_delivered(&self, id: OutboxEntryId) -> Result<()> {
        let result = sqlx::query("UPDATE outbox SET delivery_state = 'delivered' WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: OutboxEntryId) -> Result<u32> {
        let attempt_count: Option<i64> = sqlx::query_scalar(
            "UPDATE outbox SET attempt_count = attempt_count + 1 WHERE id = $1 RETURNING attempt_count",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match attempt_count {
            Some(count) => Ok(count as u32),
            None => Err(StoreError::EntryNotFound(id)),
        }
    }

    async fn mark_dead_lettered(&self, id: OutboxEntryId) -> Result<()> {
        let result = sqlx::query("UPDATE outbox SET delivery_state = 'dead_lettered' WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn has_entry_for(&self, order_id: OrderId) -> Result<bool> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM outbox WHERE order_id = $1 LIMIT 1")
                .bind(order_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        Ok(exists.is_some())
    }
}
