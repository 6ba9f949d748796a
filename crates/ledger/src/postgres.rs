//! PostgreSQL-backed inventory ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::ledger::{InventoryLedger, ReservationOutcome};
use crate::record::InventoryRecord;

/// PostgreSQL inventory ledger.
///
/// The reserve path is one conditional `UPDATE` statement: the row is
/// decremented only when `stock_quantity >= quantity`, and the database
/// serializes concurrent attempts on the row lock. No transaction spans
/// more than this single statement.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts or replaces a product's stock entry (catalog seeding).
    pub async fn upsert_record(&self, record: &InventoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, stock_quantity, unit_price_cents, version, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (product_id) DO UPDATE SET
                stock_quantity = EXCLUDED.stock_quantity,
                unit_price_cents = EXCLUDED.unit_price_cents,
                version = inventory.version + 1,
                updated_at = NOW()
            "#,
        )
        .bind(record.product_id.as_str())
        .bind(record.stock_quantity as i64)
        .bind(record.unit_price.cents())
        .bind(record.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads a product's stock entry, if present.
    pub async fn get_record(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        let row = sqlx::query(
            r#"
            SELECT product_id, stock_quantity, unit_price_cents, version, updated_at
            FROM inventory
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(InventoryRecord {
                product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                stock_quantity: row.try_get::<i64, _>("stock_quantity")? as u32,
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                version: row.try_get::<i64, _>("version")? as u64,
                updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn try_reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ReservationOutcome> {
        // The decrement and the stock check are a single statement; two
        // concurrent reservations cannot both pass the WHERE clause when
        // only one has sufficient stock.
        let row = sqlx::query(
            r#"
            UPDATE inventory
            SET stock_quantity = stock_quantity - $2,
                version = version + 1,
                updated_at = NOW()
            WHERE product_id = $1 AND stock_quantity >= $2
            RETURNING unit_price_cents
            "#,
        )
        .bind(product_id.as_str())
        .bind(quantity as i64)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            metrics::counter!("inventory_reservations_total").increment(1);
            return Ok(ReservationOutcome::Reserved {
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            });
        }

        // The conditional update matched nothing: either the product is
        // unknown or stock is short. The follow-up read is classification
        // only; `available` may already be stale by the time the caller
        // sees it.
        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM inventory WHERE product_id = $1")
                .bind(product_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => Ok(ReservationOutcome::InsufficientStock {
                available: available as u32,
            }),
            None => Ok(ReservationOutcome::NotFound),
        }
    }

    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET stock_quantity = stock_quantity + $2,
                version = version + 1,
                updated_at = NOW()
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_str())
        .bind(quantity as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(%product_id, quantity, "release for unknown product");
        } else {
            metrics::counter!("inventory_releases_total").increment(1);
        }

        Ok(())
    }
}
