//! # Sale Completion
//!
//! Records a sale and applies its effects atomically.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  complete(draft)                       one UnitOfWork                   │
//! │                                                                         │
//! │  1. insert header (ON CONFLICT DO NOTHING)                              │
//! │        │                                                                │
//! │        ├── already existed → update header only, commit, return         │
//! │        │                     (no movements, register untouched)         │
//! │        ▼                                                                │
//! │  2. for each line:                                                      │
//! │        product referenced? → ledger OUT (reason "Venta",                │
//! │                              reference "Venta ID: <id>", actor user)    │
//! │        insert line with computed subtotal                               │
//! │        │                                                                │
//! │  3. status counts toward register? (not ON_HOLD, not CANCELLED)         │
//! │        yes → get-or-create open session, accumulate(total, method)      │
//! │        │                                                                │
//! │  4. commit ── everything above, or nothing                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Held and cancelled sales still move stock when created; only the register
//! ignores them.

use chrono::Utc;
use pharmapos_core::register::RegisterSettings;
use pharmapos_core::validation::validate_sale_draft;
use pharmapos_core::{
    sale_reference, MovementKind, Sale, SaleDraft, SaleLine, SALE_MOVEMENT_REASON,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::cash_register::CashRegister;
use crate::error::{DbError, DbResult};
use crate::ledger::{MovementRequest, StockLedger};
use crate::repository::sale::{generate_sale_id, generate_sale_line_id, SaleRepository};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone)]
pub struct SaleCompletion {
    pool: SqlitePool,
    settings: RegisterSettings,
}

impl SaleCompletion {
    pub fn new(pool: SqlitePool, settings: RegisterSettings) -> Self {
        SaleCompletion { pool, settings }
    }

    /// Persists a sale; on first save also moves stock and feeds the register.
    ///
    /// ## Errors
    /// * `NotFound` - a line references a missing product or lot
    /// * `InvalidQuantity` - a line has a negative quantity
    /// * `Validation` - negative total, negative price or discount out of range
    /// * `InvalidPaymentMethod` - unknown method while the register rejects them
    /// * `ConcurrencyConflict` - a product, lot or session changed underneath
    ///
    /// On any error nothing is persisted.
    pub async fn complete(&self, draft: SaleDraft) -> DbResult<Sale> {
        validate_sale_draft(&draft)?;

        let now = Utc::now();
        let mut sale = Sale {
            id: draft.id.clone().unwrap_or_else(generate_sale_id),
            customer_id: draft.customer_id.clone(),
            user_id: draft.user_id.clone(),
            user_name: draft.user_name.clone(),
            status: draft.status,
            payment_method: draft.payment_method.clone(),
            total_cents: draft.total_cents,
            notes: draft.notes.clone(),
            created_at: now,
            updated_at: now,
            lines: Vec::new(),
        };

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let conn = uow.conn();

        if !SaleRepository::insert_header_if_absent(conn, &sale).await? {
            SaleRepository::update_header(conn, &sale, now).await?;
            let stored = SaleRepository::find(conn, &sale.id)
                .await?
                .ok_or_else(|| DbError::not_found("Sale", &sale.id))?;
            uow.commit().await?;

            info!(sale_id = %stored.id, status = %stored.status, "Existing sale updated, no stock or register effects");
            return Ok(stored);
        }

        let reference = sale_reference(&sale.id);
        for draft_line in &draft.lines {
            if let Some(product_id) = &draft_line.product_id {
                let request = MovementRequest::new(product_id, draft_line.quantity)
                    .maybe_lot(draft_line.lot_id.clone())
                    .reason(SALE_MOVEMENT_REASON)
                    .reference(reference.as_str())
                    .actor(sale.user_name.clone())
                    .product_name(draft_line.product_name.clone());
                StockLedger::apply_in(conn, MovementKind::Out, &request, now).await?;
            }

            let line = SaleLine {
                id: generate_sale_line_id(),
                sale_id: sale.id.clone(),
                product_id: draft_line.product_id.clone(),
                product_name: draft_line.product_name.clone(),
                lot_id: draft_line.lot_id.clone(),
                quantity: draft_line.quantity,
                unit_price_cents: draft_line.unit_price_cents,
                discount_bps: draft_line.discount_bps,
                subtotal_cents: draft_line.subtotal().cents(),
                created_at: now,
            };
            SaleRepository::insert_line(conn, &line).await?;
            sale.lines.push(line);
        }

        if sale.status.counts_toward_register() {
            let session = CashRegister::accumulate_in(
                conn,
                &self.settings,
                sale.total(),
                &sale.payment_method,
                now,
            )
            .await?;
            debug!(sale_id = %sale.id, session_id = %session.id, "Sale added to cash session");
        } else {
            debug!(sale_id = %sale.id, status = %sale.status, "Register skipped for sale status");
        }

        uow.commit().await?;

        info!(
            sale_id = %sale.id,
            lines = sale.lines.len(),
            total = sale.total().cents(),
            status = %sale.status,
            "Sale completed"
        );
        Ok(sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::new_product;
    use crate::retry::{retry_on_conflict, RetryPolicy};
    use std::time::Duration;
    use pharmapos_core::register::UnknownPaymentPolicy;
    use pharmapos_core::{CoreError, Product, SaleLineDraft, SaleStatus};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn stocked(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        let product = new_product(name, price_cents);
        db.products().insert(&product).await.unwrap();
        db.stock_ledger()
            .receive(MovementRequest::new(&product.id, stock).reason("Inventario inicial"))
            .await
            .unwrap();
        product
    }

    fn line(product: &Product, quantity: i64) -> SaleLineDraft {
        SaleLineDraft {
            product_id: Some(product.id.clone()),
            product_name: Some(product.name.clone()),
            quantity,
            unit_price_cents: product.price_cents,
            ..Default::default()
        }
    }

    fn draft(lines: Vec<SaleLineDraft>, status: SaleStatus, total_cents: Option<i64>) -> SaleDraft {
        SaleDraft {
            user_name: Some("cajero1".into()),
            lines,
            payment_method: "EFECTIVO".into(),
            status,
            total_cents,
            ..Default::default()
        }
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock()
    }

    #[tokio::test]
    async fn test_two_lines_emit_two_out_movements() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;
        let b = stocked(&db, "Loratadina 10mg", 4000, 5).await;

        let sale = db
            .sale_completion()
            .complete(draft(
                vec![line(&a, 3), line(&b, 1)],
                SaleStatus::Completed,
                Some(17_650),
            ))
            .await
            .unwrap();

        let reference = sale_reference(&sale.id);
        let movements = db.movements().list_by_reference(&reference).await.unwrap();
        assert_eq!(movements.len(), 2);
        for m in &movements {
            assert_eq!(m.kind, MovementKind::Out);
            assert_eq!(m.reason.as_deref(), Some(SALE_MOVEMENT_REASON));
            assert_eq!(m.actor.as_deref(), Some("cajero1"));
        }

        let ma = movements.iter().find(|m| m.product_id == a.id).unwrap();
        assert_eq!((ma.stock_before, ma.stock_after), (10, 7));
        let mb = movements.iter().find(|m| m.product_id == b.id).unwrap();
        assert_eq!((mb.stock_before, mb.stock_after), (5, 4));

        assert_eq!(stock_of(&db, &a.id).await, 7);
        assert_eq!(stock_of(&db, &b.id).await, 4);

        let stored = db.sales().get(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 2);
        assert_eq!(stored.lines[0].subtotal_cents, 13_650);

        let session = db.cash_register().current().await.unwrap();
        assert_eq!(session.cash_sales_cents, 17_650);
        assert_eq!(session.sale_count, 1);
    }

    #[tokio::test]
    async fn test_missing_product_rolls_back_everything() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;
        let movements_before = db.movements().count().await.unwrap();

        let mut ghost = line(&a, 1);
        ghost.product_id = Some("no-such-product".into());

        let err = db
            .sale_completion()
            .complete(draft(
                vec![line(&a, 3), ghost],
                SaleStatus::Completed,
                Some(13_650),
            ))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(stock_of(&db, &a.id).await, 10);
        assert_eq!(db.movements().count().await.unwrap(), movements_before);
        assert_eq!(db.cash_sessions().count_open().await.unwrap(), 0);

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    #[tokio::test]
    async fn test_resaving_existing_sale_has_no_effects() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        let sale = db
            .sale_completion()
            .complete(draft(vec![line(&a, 2)], SaleStatus::Completed, Some(9_100)))
            .await
            .unwrap();
        let session_before = db.cash_register().current().await.unwrap();
        let movements_before = db.movements().count().await.unwrap();

        let mut again = draft(vec![line(&a, 2)], SaleStatus::Completed, Some(9_100));
        again.id = Some(sale.id.clone());
        again.notes = Some("Factura solicitada".into());
        let updated = db.sale_completion().complete(again).await.unwrap();

        assert_eq!(updated.id, sale.id);
        assert_eq!(updated.notes.as_deref(), Some("Factura solicitada"));
        assert_eq!(updated.lines.len(), 1);
        assert_eq!(db.movements().count().await.unwrap(), movements_before);
        assert_eq!(stock_of(&db, &a.id).await, 8);

        let session_after = db.cash_register().current().await.unwrap();
        assert_eq!(session_after.sale_count, session_before.sale_count);
        assert_eq!(session_after.total_sales_cents, session_before.total_sales_cents);
        assert_eq!(session_after.sync_version, session_before.sync_version);
    }

    #[tokio::test]
    async fn test_held_sale_moves_stock_but_not_cash() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        db.sale_completion()
            .complete(draft(vec![line(&a, 4)], SaleStatus::OnHold, Some(18_200)))
            .await
            .unwrap();

        assert_eq!(stock_of(&db, &a.id).await, 6);
        assert_eq!(db.cash_sessions().count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_sale_leaves_open_session_untouched() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;
        let before = db.cash_register().current().await.unwrap();

        db.sale_completion()
            .complete(draft(vec![line(&a, 1)], SaleStatus::Cancelled, Some(4_550)))
            .await
            .unwrap();

        let after = db.cash_register().current().await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.sale_count, 0);
        assert_eq!(after.sync_version, before.sync_version);
    }

    #[tokio::test]
    async fn test_missing_total_counts_as_zero() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        db.sale_completion()
            .complete(draft(vec![line(&a, 1)], SaleStatus::Completed, None))
            .await
            .unwrap();

        let session = db.cash_register().current().await.unwrap();
        assert_eq!(session.sale_count, 1);
        assert_eq!(session.total_sales_cents, 0);
    }

    #[tokio::test]
    async fn test_client_generated_id_counts_as_new() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        let mut d = draft(vec![line(&a, 1)], SaleStatus::Completed, Some(4_550));
        d.id = Some("till-7-000123".into());
        let sale = db.sale_completion().complete(d).await.unwrap();

        assert_eq!(sale.id, "till-7-000123");
        assert_eq!(stock_of(&db, &a.id).await, 9);
    }

    #[tokio::test]
    async fn test_rejected_payment_method_rolls_back_stock() {
        let db = setup().await.with_register(RegisterSettings {
            unknown_payment: UnknownPaymentPolicy::Reject,
            ..Default::default()
        });
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        let mut d = draft(vec![line(&a, 2)], SaleStatus::Completed, Some(9_100));
        d.payment_method = "CHEQUE".into();
        let err = db.sale_completion().complete(d).await.unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::InvalidPaymentMethod(_))));
        assert_eq!(stock_of(&db, &a.id).await, 10);
    }

    #[tokio::test]
    async fn test_lot_forwarded_to_ledger() {
        let db = setup().await;
        let a = new_product("Amoxicilina 500mg", 9000);
        db.products().insert(&a).await.unwrap();
        let lot = db.lots().create(&a.id, "AMX-01", None).await.unwrap();
        db.stock_ledger()
            .receive(MovementRequest::new(&a.id, 6).lot(&lot.id))
            .await
            .unwrap();

        let mut l = line(&a, 2);
        l.lot_id = Some(lot.id.clone());
        db.sale_completion()
            .complete(draft(vec![l], SaleStatus::Completed, Some(18_000)))
            .await
            .unwrap();

        let lot = db.lots().get_by_id(&lot.id).await.unwrap().unwrap();
        assert_eq!(lot.available_quantity, 4);
        assert_eq!(stock_of(&db, &a.id).await, 4);
    }

    #[tokio::test]
    async fn test_card_sale_lands_in_card_bucket() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        let mut d = draft(vec![line(&a, 1)], SaleStatus::Completed, Some(4_550));
        d.payment_method = "tarjeta_debito".into();
        d.customer_id = Some("cliente-42".into());
        db.sale_completion().complete(d).await.unwrap();

        let session = db.cash_register().current().await.unwrap();
        assert_eq!(session.card_sales_cents, 4_550);
        assert_eq!(session.cash_sales_cents, 0);

        let history = db.sales().list_for_customer("cliente-42").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lines.len(), 1);
    }

    #[tokio::test]
    async fn test_negative_quantity_without_product_is_rejected() {
        let db = setup().await;

        let free_line = SaleLineDraft {
            product_name: Some("Servicio de inyeccion".into()),
            quantity: -3,
            unit_price_cents: 100,
            ..Default::default()
        };

        let err = db
            .sale_completion()
            .complete(draft(vec![free_line], SaleStatus::Completed, Some(300)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidQuantity { quantity: -3, .. })
        ));
        assert_eq!(db.cash_sessions().count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_negative_total_is_rejected_before_any_write() {
        let db = setup().await;
        let a = stocked(&db, "Paracetamol 500mg", 4550, 10).await;

        let err = db
            .sale_completion()
            .complete(draft(vec![line(&a, 1)], SaleStatus::Completed, Some(-300)))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(stock_of(&db, &a.id).await, 10);
        assert_eq!(db.cash_sessions().count_open().await.unwrap(), 0);

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_accumulate_into_one_session() {
        const SALES: i64 = 16;

        let path = std::env::temp_dir().join(format!("pharmapos-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(6))
            .await
            .unwrap();
        let a = stocked(&db, "Paracetamol 500mg", 100, 100).await;

        let policy = RetryPolicy {
            max_attempts: 100,
            initial_interval: Duration::from_millis(2),
            max_interval: Duration::from_millis(50),
        };

        let handles: Vec<_> = (0..SALES)
            .map(|_| {
                let completion = db.sale_completion();
                let policy = policy.clone();
                let d = draft(vec![line(&a, 1)], SaleStatus::Completed, Some(100));
                tokio::spawn(async move {
                    retry_on_conflict(&policy, || completion.complete(d.clone())).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(db.cash_sessions().count_open().await.unwrap(), 1);

        let session = db.cash_register().current().await.unwrap();
        assert_eq!(session.sale_count, SALES);
        assert_eq!(session.cash_sales_cents, SALES * 100);
        assert_eq!(session.total_sales_cents, SALES * 100);
        assert_eq!(stock_of(&db, &a.id).await, 100 - SALES);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
