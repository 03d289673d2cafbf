//! # Sale Repository
//!
//! Persistence for sale headers and lines. Stock and register effects of a
//! sale live in `SaleCompletion`; this module only stores rows.
//!
//! ## Snapshot Pattern
//! Product name, unit price and discount are copied onto each line, so a
//! later catalog change never rewrites what was sold.

use chrono::{DateTime, Utc};
use pharmapos_core::{Sale, SaleLine};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const SALE_COLUMNS: &str = r#"
    id, customer_id, user_id, user_name, status, payment_method,
    total_cents, notes, created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id, sale_id, product_id, product_name, lot_id, quantity,
    unit_price_cents, discount_bps, subtotal_cents, created_at
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Sales of one customer, newest first, with their lines.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE customer_id = ?1 ORDER BY created_at DESC, id DESC"
        );
        let mut sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(customer_id)
            .fetch_all(&mut *conn)
            .await?;

        for sale in &mut sales {
            sale.lines = Self::lines(&mut conn, &sale.id).await?;
        }

        Ok(sales)
    }

    // =========================================================================
    // Connection-level operations
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match sale {
            Some(mut sale) => {
                sale.lines = Self::lines(conn, id).await?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    pub async fn lines(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY created_at, rowid"
        );
        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(sale_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(lines)
    }

    /// Inserts the header unless a sale with this id already exists.
    ///
    /// ## Returns
    /// `true` when the sale is new. Lines are not touched.
    pub async fn insert_header_if_absent(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, user_id, user_name, status, payment_method,
                total_cents, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(&sale.user_name)
        .bind(sale.status)
        .bind(&sale.payment_method)
        .bind(sale.total_cents)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        let created = result.rows_affected() == 1;
        debug!(id = %sale.id, created, "Sale header stored");
        Ok(created)
    }

    /// Rewrites the header of an existing sale. Lines and creation time stay.
    pub async fn update_header(
        conn: &mut SqliteConnection,
        sale: &Sale,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %sale.id, status = %sale.status, "Updating sale header");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                customer_id = ?2,
                user_id = ?3,
                user_name = ?4,
                status = ?5,
                payment_method = ?6,
                total_cents = ?7,
                notes = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(&sale.user_name)
        .bind(sale.status)
        .bind(&sale.payment_method)
        .bind(sale.total_cents)
        .bind(&sale.notes)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &sale.id));
        }

        Ok(())
    }

    pub async fn insert_line(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
        debug!(sale_id = %line.sale_id, product_id = ?line.product_id, "Adding sale line");

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, product_name, lot_id, quantity,
                unit_price_cents, discount_bps, subtotal_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(&line.product_name)
        .bind(&line.lot_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.discount_bps)
        .bind(line.subtotal_cents)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale line ID.
pub fn generate_sale_line_id() -> String {
    Uuid::new_v4().to_string()
}
