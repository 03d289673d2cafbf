//! # Lot Repository
//!
//! Batches of a product, each with its own expiry and available quantity.
//! Quantities change only through the stock ledger, using the same
//! versioned write as products.

use chrono::{DateTime, NaiveDate, Utc};
use pharmapos_core::validation::validate_lot_number;
use pharmapos_core::Lot;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const LOT_COLUMNS: &str = r#"
    id, product_id, lot_number, expires_on, available_quantity,
    created_at, updated_at, sync_version
"#;

#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Lot>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Lots of a product, soonest expiry first (undated lots last).
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Lot>> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM lots WHERE product_id = ?1 \
             ORDER BY expires_on IS NULL, expires_on, lot_number"
        );
        let lots = sqlx::query_as::<_, Lot>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lots)
    }

    /// Registers a new, empty lot for an existing product.
    ///
    /// Stock arrives through `StockLedger::receive` with this lot's id.
    pub async fn create(
        &self,
        product_id: &str,
        lot_number: &str,
        expires_on: Option<NaiveDate>,
    ) -> DbResult<Lot> {
        validate_lot_number(lot_number)?;

        let now = Utc::now();
        let lot = Lot {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            lot_number: lot_number.trim().to_string(),
            expires_on,
            available_quantity: 0,
            created_at: now,
            updated_at: now,
            sync_version: 0,
        };

        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, &lot).await?;
        Ok(lot)
    }

    // =========================================================================
    // Connection-level operations
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Lot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = ?1");
        let lot = sqlx::query_as::<_, Lot>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(lot)
    }

    pub async fn insert_in(conn: &mut SqliteConnection, lot: &Lot) -> DbResult<()> {
        debug!(id = %lot.id, product_id = %lot.product_id, lot_number = %lot.lot_number, "Inserting lot");

        sqlx::query(
            r#"
            INSERT INTO lots (
                id, product_id, lot_number, expires_on, available_quantity,
                created_at, updated_at, sync_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&lot.id)
        .bind(&lot.product_id)
        .bind(&lot.lot_number)
        .bind(lot.expires_on)
        .bind(lot.available_quantity)
        .bind(lot.created_at)
        .bind(lot.updated_at)
        .bind(lot.sync_version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes a new available quantity if the row is still at `expected_version`.
    pub async fn write_quantity(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
        new_quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE lots
            SET available_quantity = ?3, updated_at = ?4, sync_version = sync_version + 1
            WHERE id = ?1 AND sync_version = ?2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(new_quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Lot", id));
        }

        Ok(())
    }
}
