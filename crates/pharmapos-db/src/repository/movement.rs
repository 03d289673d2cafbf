//! # Movement Repository
//!
//! The inventory movement log: append-only storage for ledger entries.
//!
//! ## Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ORDER BY created_at DESC, id DESC                                      │
//! │                                                                         │
//! │  Ids are UUID v7 (timestamp prefix), so two movements written in the    │
//! │  same instant still come back in a stable, newest-first order.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no update or delete here; the table itself rejects both.
//! Corrections are new ADJUST movements.

use pharmapos_core::InventoryMovement;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

const MOVEMENT_COLUMNS: &str = r#"
    id, product_id, product_name, lot_id, kind, quantity,
    stock_before, stock_after, reason, reference, actor, notes, created_at
"#;

/// Read access to the movement log, plus the single append operation.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Every movement, newest first.
    pub async fn all(&self) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements ORDER BY created_at DESC, id DESC"
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryMovement>> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE id = ?1");
        let movement = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(movement)
    }

    /// Movements of one product, newest first, ties broken by id descending.
    pub async fn list_by_product(&self, product_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
             WHERE product_id = ?1 ORDER BY created_at DESC, id DESC"
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Movements carrying a given reference (e.g. every line of one sale).
    pub async fn list_by_reference(&self, reference: &str) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
             WHERE reference = ?1 ORDER BY created_at DESC, id DESC"
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Appends one movement on the given connection.
    pub async fn insert(conn: &mut SqliteConnection, movement: &InventoryMovement) -> DbResult<()> {
        debug!(
            id = %movement.id,
            product_id = %movement.product_id,
            kind = %movement.kind,
            quantity = movement.quantity,
            "Appending inventory movement"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, product_id, product_name, lot_id, kind, quantity,
                stock_before, stock_after, reason, reference, actor, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(&movement.product_name)
        .bind(&movement.lot_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(&movement.actor)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// Time-ordered id for a new movement.
pub fn generate_movement_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::new_product;
    use chrono::Utc;
    use pharmapos_core::MovementKind;

    fn movement(id: &str, product_id: &str, created_at: chrono::DateTime<Utc>) -> InventoryMovement {
        InventoryMovement {
            id: id.to_string(),
            product_id: product_id.to_string(),
            product_name: None,
            lot_id: None,
            kind: MovementKind::In,
            quantity: 1,
            stock_before: 0,
            stock_after: 1,
            reason: None,
            reference: None,
            actor: None,
            notes: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_ties_fall_back_to_id_descending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Naproxeno 250mg", 5000);
        db.products().insert(&product).await.unwrap();

        let same_instant = Utc::now();
        let earlier = same_instant - chrono::Duration::seconds(10);

        let mut conn = db.pool().acquire().await.unwrap();
        for (id, at) in [
            ("00000000-0000-7000-8000-00000000000b", same_instant),
            ("00000000-0000-7000-8000-000000000000", earlier),
            ("00000000-0000-7000-8000-00000000000c", same_instant),
            ("00000000-0000-7000-8000-00000000000a", same_instant),
        ] {
            MovementRepository::insert(&mut conn, &movement(id, &product.id, at))
                .await
                .unwrap();
        }
        drop(conn);

        let listed = db.movements().list_by_product(&product.id).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|m| &m.id[m.id.len() - 2..]).collect();
        assert_eq!(ids, vec!["0c", "0b", "0a", "00"]);

        // Stable across reads
        let again = db.movements().list_by_product(&product.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|m| &m.id).collect::<Vec<_>>(),
            again.iter().map(|m| &m.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_movements_are_immutable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Cetirizina 10mg", 3500);
        db.products().insert(&product).await.unwrap();

        let m = movement(&generate_movement_id(), &product.id, Utc::now());
        let mut conn = db.pool().acquire().await.unwrap();
        MovementRepository::insert(&mut conn, &m).await.unwrap();

        let update = sqlx::query("UPDATE inventory_movements SET quantity = 99 WHERE id = ?1")
            .bind(&m.id)
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM inventory_movements WHERE id = ?1")
            .bind(&m.id)
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
        drop(conn);

        assert_eq!(db.movements().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let err = MovementRepository::insert(&mut conn, &movement("m1", "ghost", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
