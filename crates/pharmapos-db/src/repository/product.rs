//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Catalog reads (by id, SKU, low-stock report)
//! - Validated catalog inserts and updates
//! - Versioned stock writes, reserved for the stock ledger
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products                                                        │
//! │  SET current_stock = :after, sync_version = sync_version + 1            │
//! │  WHERE id = :id AND sync_version = :version_read                        │
//! │                                                                         │
//! │  1 row  → the write was based on the latest value                       │
//! │  0 rows → someone else wrote in between → ConcurrencyConflict           │
//! │                                                                         │
//! │  `update()` never touches current_stock; only the ledger moves stock.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use pharmapos_core::validation::{
    validate_price_cents, validate_product_name, validate_sku, validate_thresholds,
};
use pharmapos_core::Product;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = r#"
    id, name, sku, barcode, active_ingredient, regulation,
    price_cents, cost_cents, current_stock, min_stock, optimal_stock,
    is_active, created_at, updated_at, sync_version
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_id("uuid-here").await?;
/// let reorder = repo.low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Active products at or below their reorder threshold.
    ///
    /// An unset stock counts as zero, so never-stocked products are listed.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND COALESCE(current_stock, 0) <= min_stock \
             ORDER BY COALESCE(current_stock, 0), name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Low stock report");
        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(Validation))` - bad name, SKU, price or thresholds
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, product).await?;
        Ok(product.clone())
    }

    /// Updates catalog fields. Stock is left alone; use the stock ledger.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(Validation))` - bad name, SKU, price or thresholds
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_catalog_fields(product)?;
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                barcode = ?4,
                active_ingredient = ?5,
                regulation = ?6,
                price_cents = ?7,
                cost_cents = ?8,
                min_stock = ?9,
                optimal_stock = ?10,
                is_active = ?11,
                updated_at = ?12,
                sync_version = sync_version + 1
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.active_ingredient)
        .bind(&product.regulation)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.min_stock)
        .bind(product.optimal_stock)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Connection-level operations (composable inside a UnitOfWork)
    // =========================================================================

    /// Reads a product on the given connection.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(product)
    }

    /// Inserts a product on the given connection.
    pub async fn insert_in(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        validate_catalog_fields(product)?;
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, barcode, active_ingredient, regulation,
                price_cents, cost_cents, current_stock, min_stock, optimal_stock,
                is_active, created_at, updated_at, sync_version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.active_ingredient)
        .bind(&product.regulation)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.current_stock)
        .bind(product.min_stock)
        .bind(product.optimal_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.sync_version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes a new stock value if the row is still at `expected_version`.
    ///
    /// ## Returns
    /// * `Err(DbError::ConcurrencyConflict)` - the row changed since it was read
    pub async fn write_stock(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
        new_stock: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = ?3, updated_at = ?4, sync_version = sync_version + 1
            WHERE id = ?1 AND sync_version = ?2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(new_stock)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Product", id));
        }

        Ok(())
    }
}

fn validate_catalog_fields(product: &Product) -> DbResult<()> {
    validate_product_name(&product.name)?;
    if let Some(sku) = &product.sku {
        validate_sku(sku)?;
    }
    validate_price_cents(product.price_cents)?;
    validate_thresholds(product.min_stock, product.optimal_stock)?;
    Ok(())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds an empty-shelf product with default thresholds, for callers that
/// only know a name and a price.
pub fn new_product(name: impl Into<String>, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: generate_product_id(),
        name: name.into(),
        sku: None,
        barcode: None,
        active_ingredient: None,
        regulation: None,
        price_cents,
        cost_cents: None,
        current_stock: None,
        min_stock: 0,
        optimal_stock: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
        sync_version: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use pharmapos_core::CoreError;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let mut product = new_product("Paracetamol 500mg", 4550);
        product.sku = Some("PARA-500".into());
        db.products().insert(&product).await.unwrap();

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Paracetamol 500mg");
        assert_eq!(loaded.current_stock, None);
        assert_eq!(loaded.stock(), 0);

        let by_sku = db.products().get_by_sku("PARA-500").await.unwrap();
        assert!(by_sku.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = setup().await;
        let mut a = new_product("A", 100);
        a.sku = Some("DUP".into());
        let mut b = new_product("B", 100);
        b.sku = Some("DUP".into());

        db.products().insert(&a).await.unwrap();
        let err = db.products().insert(&b).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_does_not_touch_stock() {
        let db = setup().await;
        let mut product = new_product("Ibuprofeno 400mg", 6000);
        product.current_stock = Some(12);
        db.products().insert(&product).await.unwrap();

        product.current_stock = Some(999);
        product.price_cents = 6500;
        db.products().update(&product).await.unwrap();

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.price_cents, 6500);
        assert_eq!(loaded.current_stock, Some(12));
        assert_eq!(loaded.sync_version, 1);
    }

    #[tokio::test]
    async fn test_stale_stock_write_conflicts() {
        let db = setup().await;
        let product = new_product("Omeprazol 20mg", 3000);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        ProductRepository::write_stock(&mut conn, &product.id, 0, 5, Utc::now())
            .await
            .unwrap();

        let err = ProductRepository::write_stock(&mut conn, &product.id, 0, 7, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let db = setup().await;
        let mut low = new_product("Amoxicilina 500mg", 9000);
        low.current_stock = Some(2);
        low.min_stock = 5;
        low.optimal_stock = 20;
        let mut fine = new_product("Loratadina 10mg", 4000);
        fine.current_stock = Some(50);
        fine.min_stock = 5;
        fine.optimal_stock = 20;
        let never_stocked = new_product("Vitamina C", 2000);

        for p in [&low, &fine, &never_stocked] {
            db.products().insert(p).await.unwrap();
        }

        let report = db.products().low_stock().await.unwrap();
        let ids: Vec<_> = report.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![never_stocked.id.as_str(), low.id.as_str()]);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_catalog_fields() {
        let db = setup().await;

        let blank = new_product("  ", 100);
        let err = db.products().insert(&blank).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let mut bad_sku = new_product("Naproxeno 250mg", 8900);
        bad_sku.sku = Some("NAP 250".into());
        assert!(db.products().insert(&bad_sku).await.is_err());

        let mut inverted = new_product("Naproxeno 250mg", 8900);
        inverted.min_stock = 30;
        inverted.optimal_stock = 10;
        assert!(db.products().insert(&inverted).await.is_err());

        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_negative_price() {
        let db = setup().await;
        let mut product = new_product("Cetirizina 10mg", 4650);
        db.products().insert(&product).await.unwrap();

        product.price_cents = -1;
        let err = db.products().update(&product).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.price_cents, 4650);
        assert_eq!(loaded.sync_version, 0);
    }
}
