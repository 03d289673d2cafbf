//! # Stock Ledger
//!
//! The only path that changes product or lot stock. Every change writes one
//! immutable movement in the same unit of work as the stock update.
//!
//! ## Apply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply(kind, request)                                                   │
//! │    │                                                                    │
//! │    ├─ quantity valid for kind?          no → InvalidQuantity            │
//! │    ├─ product exists?                   no → NotFound                   │
//! │    ├─ lot exists? belongs to product?   no → NotFound / LotMismatch     │
//! │    │                                                                    │
//! │    ├─ product: before → max(0, before + delta)   versioned write        │
//! │    ├─ lot:     before → max(0, before + delta)   versioned write        │
//! │    └─ movement(before, after) appended                                  │
//! │                                                                         │
//! │  Any failure drops the unit of work: no stock change, no movement.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use pharmapos_core::stock::StockTransition;
use pharmapos_core::{CoreError, InventoryMovement, MovementKind};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::lot::LotRepository;
use crate::repository::movement::{generate_movement_id, MovementRepository};
use crate::repository::product::ProductRepository;
use crate::unit_of_work::UnitOfWork;

// =============================================================================
// Movement Request
// =============================================================================

/// What to move and why. The direction is chosen by the ledger method.
///
/// ## Example
/// ```rust,ignore
/// let request = MovementRequest::new(&product.id, 24)
///     .lot(&lot.id)
///     .reason("Compra")
///     .reference("Factura F-1043")
///     .actor("almacen");
/// ledger.receive(request).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MovementRequest {
    pub product_id: String,
    pub lot_id: Option<String>,
    /// Magnitude for receive/dispatch, signed delta for adjust.
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub actor: Option<String>,
    pub notes: Option<String>,
    /// Overrides the product name frozen on the movement.
    pub product_name: Option<String>,
}

impl MovementRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        MovementRequest {
            product_id: product_id.into(),
            quantity,
            ..Default::default()
        }
    }

    pub fn lot(mut self, lot_id: impl Into<String>) -> Self {
        self.lot_id = Some(lot_id.into());
        self
    }

    /// Sets the lot only when one is given.
    pub fn maybe_lot(mut self, lot_id: Option<String>) -> Self {
        self.lot_id = lot_id;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn product_name(mut self, name: Option<String>) -> Self {
        self.product_name = name;
        self
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Goods received (IN).
    pub async fn receive(&self, request: MovementRequest) -> DbResult<InventoryMovement> {
        self.apply(MovementKind::In, request).await
    }

    /// Goods leaving the shelf (OUT).
    pub async fn dispatch(&self, request: MovementRequest) -> DbResult<InventoryMovement> {
        self.apply(MovementKind::Out, request).await
    }

    /// Physical count correction; `request.quantity` is a signed delta.
    pub async fn adjust(&self, request: MovementRequest) -> DbResult<InventoryMovement> {
        self.apply(MovementKind::Adjust, request).await
    }

    /// Applies one movement in its own unit of work.
    pub async fn apply(
        &self,
        kind: MovementKind,
        request: MovementRequest,
    ) -> DbResult<InventoryMovement> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let movement = Self::apply_in(uow.conn(), kind, &request, Utc::now()).await?;
        uow.commit().await?;

        info!(
            movement_id = %movement.id,
            product_id = %movement.product_id,
            kind = %movement.kind,
            before = movement.stock_before,
            after = movement.stock_after,
            "Stock movement applied"
        );
        Ok(movement)
    }

    /// Applies one movement on a connection owned by an enclosing unit of work.
    pub async fn apply_in(
        conn: &mut SqliteConnection,
        kind: MovementKind,
        request: &MovementRequest,
        now: DateTime<Utc>,
    ) -> DbResult<InventoryMovement> {
        // Reject a bad quantity before reading anything.
        pharmapos_core::stock::signed_delta(kind, request.quantity)?;

        let product = ProductRepository::find(conn, &request.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &request.product_id))?;

        let lot = match &request.lot_id {
            Some(lot_id) => {
                let lot = LotRepository::find(conn, lot_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Lot", lot_id))?;
                if lot.product_id != product.id {
                    return Err(CoreError::LotProductMismatch {
                        lot_id: lot.id,
                        product_id: product.id,
                    }
                    .into());
                }
                Some(lot)
            }
            None => None,
        };

        let stock = StockTransition::compute(product.current_stock, kind, request.quantity)?;
        if stock.was_clamped(kind, request.quantity) {
            warn!(
                product_id = %product.id,
                before = stock.before,
                quantity = request.quantity,
                "Product stock floored at zero"
            );
        }
        ProductRepository::write_stock(conn, &product.id, product.sync_version, stock.after, now)
            .await?;

        if let Some(lot) = &lot {
            let lot_stock =
                StockTransition::compute(Some(lot.available_quantity), kind, request.quantity)?;
            if lot_stock.was_clamped(kind, request.quantity) {
                warn!(lot_id = %lot.id, before = lot_stock.before, "Lot quantity floored at zero");
            }
            LotRepository::write_quantity(conn, &lot.id, lot.sync_version, lot_stock.after, now)
                .await?;
            debug!(
                lot_id = %lot.id,
                before = lot_stock.before,
                after = lot_stock.after,
                "Lot quantity updated"
            );
        }

        let movement = InventoryMovement {
            id: generate_movement_id(),
            product_id: product.id,
            product_name: request.product_name.clone().or(Some(product.name)),
            lot_id: lot.map(|l| l.id),
            kind,
            quantity: request.quantity,
            stock_before: stock.before,
            stock_after: stock.after,
            reason: request.reason.clone(),
            reference: request.reference.clone(),
            actor: request.actor.clone(),
            notes: request.notes.clone(),
            created_at: now,
        };
        MovementRepository::insert(conn, &movement).await?;

        Ok(movement)
    }

    // =========================================================================
    // Movement log queries
    // =========================================================================

    /// Every movement, newest first.
    pub async fn all(&self) -> DbResult<Vec<InventoryMovement>> {
        MovementRepository::new(self.pool.clone()).all().await
    }

    pub async fn get(&self, id: &str) -> DbResult<InventoryMovement> {
        MovementRepository::new(self.pool.clone())
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryMovement", id))
    }

    /// Movements of one product, newest first, ties by id descending.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<InventoryMovement>> {
        MovementRepository::new(self.pool.clone())
            .list_by_product(product_id)
            .await
    }
}
