//! # Domain Types
//!
//! Core domain types used throughout PharmaPOS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Product      │◄──│      Lot        │   │ InventoryMovement   │   │
//! │  │  current_stock  │   │  available_qty  │   │ kind, quantity      │   │
//! │  │  min / optimal  │   │  expires_on     │   │ stock_before/after  │   │
//! │  └────────▲────────┘   └────────▲────────┘   └──────────┬──────────┘   │
//! │           └─────────────────────┴──── referenced by ────┘              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │     Sale        │   │  CashSession    │◄──│  CashWithdrawal     │   │
//! │  │  status, lines  │──►│  bucket totals  │   │  amount, reason     │   │
//! │  │  payment_method │   │  Open → Closed  │   │  authorized_by      │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock and totals are only ever mutated through the ledger and the
//! register; these structs are plain data plus read helpers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product on the pharmacy shelf.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to the cashier and on the ticket.
    pub name: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: Option<String>,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Active ingredient, free text.
    pub active_ingredient: Option<String>,

    /// Regulatory class (over the counter, antibiotic, controlled...).
    /// Passed through unchanged; prescription rules live elsewhere.
    pub regulation: Option<String>,

    /// Sale price in cents.
    pub price_cents: i64,

    /// Purchase cost in cents.
    pub cost_cents: Option<i64>,

    /// Aggregate stock. Denormalized cache of the movement ledger,
    /// never negative once written.
    pub current_stock: Option<i64>,

    /// Reorder threshold.
    pub min_stock: i64,

    /// Target stock after restocking.
    pub optimal_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency token, bumped on every write.
    pub sync_version: i64,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Current stock, treating an unset value as zero.
    #[inline]
    pub fn stock(&self) -> i64 {
        self.current_stock.unwrap_or(0)
    }

    /// True when stock has fallen to the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock() <= self.min_stock
    }
}

// =============================================================================
// Lot
// =============================================================================

/// A batch of a product with its own expiry and available quantity.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Lot {
    pub id: String,

    /// Owning product.
    pub product_id: String,

    /// Manufacturer lot number printed on the box.
    pub lot_number: String,

    #[ts(as = "Option<String>")]
    pub expires_on: Option<NaiveDate>,

    /// Units left in this lot, never negative once written.
    pub available_quantity: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    pub sync_version: i64,
}

impl Lot {
    /// True once the expiry date has been reached.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_on.map(|d| d <= today).unwrap_or(false)
    }
}

// =============================================================================
// Movement Kind
// =============================================================================

/// Direction of a stock movement.
///
/// `In` and `Out` take a non-negative magnitude; `Adjust` takes a signed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Goods received.
    #[serde(alias = "ENTRADA")]
    In,
    /// Goods leaving the shelf (sales, breakage).
    #[serde(alias = "SALIDA")]
    Out,
    /// Physical count correction.
    #[serde(alias = "AJUSTE")]
    Adjust,
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementKind::In => write!(f, "IN"),
            MovementKind::Out => write!(f, "OUT"),
            MovementKind::Adjust => write!(f, "ADJUST"),
        }
    }
}

// =============================================================================
// Inventory Movement
// =============================================================================

/// An immutable ledger entry recording one stock change.
///
/// `stock_before`/`stock_after` are the product values actually persisted,
/// so `stock_after` is already floored at zero.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    /// UUID v7, so id order follows creation order.
    pub id: String,
    pub product_id: String,
    /// Product name at the time of the movement (frozen).
    pub product_name: Option<String>,
    pub lot_id: Option<String>,
    pub kind: MovementKind,
    /// Magnitude for IN/OUT, signed delta for ADJUST.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    /// Who performed the movement.
    pub actor: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Session
// =============================================================================

/// Lifecycle of a register session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    #[serde(alias = "ABIERTO")]
    Open,
    #[serde(alias = "CERRADO")]
    Closed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Open => write!(f, "open"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// A cash register session (shift). At most one is open at a time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub register_number: i64,
    pub cashier_id: Option<String>,
    pub cashier_name: Option<String>,
    pub supervisor_id: Option<String>,
    pub supervisor_name: Option<String>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Opening float in the drawer.
    pub opening_fund_cents: i64,
    pub cash_sales_cents: i64,
    pub card_sales_cents: i64,
    pub transfer_sales_cents: i64,
    pub total_sales_cents: i64,
    pub total_refunds_cents: i64,
    pub withdrawals_cents: i64,

    /// Filled in on close.
    pub declared_cash_cents: i64,
    pub expected_cash_cents: i64,
    pub difference_cents: i64,

    pub sale_count: i64,
    pub cancellation_count: i64,
    pub status: SessionStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub sync_version: i64,
}

/// Cash taken out of the drawer mid-shift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashWithdrawal {
    pub id: String,
    pub session_id: String,
    pub amount_cents: i64,
    pub reason: String,
    pub authorized_by: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashWithdrawal {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    /// Items still being rung up.
    #[default]
    #[serde(alias = "EN_PROCESO")]
    InProgress,
    /// Parked by the cashier, not financially final.
    #[serde(alias = "EN_ESPERA")]
    OnHold,
    #[serde(alias = "COMPLETADA")]
    Completed,
    #[serde(alias = "CANCELADA")]
    Cancelled,
}

impl SaleStatus {
    /// Whether a sale in this status counts toward the open cash session.
    pub fn counts_toward_register(&self) -> bool {
        !matches!(self, SaleStatus::OnHold | SaleStatus::Cancelled)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleStatus::InProgress => write!(f, "in_progress"),
            SaleStatus::OnHold => write!(f, "on_hold"),
            SaleStatus::Completed => write!(f, "completed"),
            SaleStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale header with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
    /// Recorded as the actor on the sale's stock movements.
    pub user_name: Option<String>,
    pub status: SaleStatus,
    /// Raw payment method as sent by the till ("EFECTIVO", "TARJETA_DEBITO"...).
    pub payment_method: String,
    pub total_cents: Option<i64>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub lines: Vec<SaleLine>,
}

impl Sale {
    /// The amount this sale adds to the register; a missing total counts as zero.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_optional_cents(self.total_cents)
    }
}

/// A persisted sale line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: Option<String>,
    /// Product name at time of sale (frozen).
    pub product_name: Option<String>,
    pub lot_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Percentage discount in basis points (1000 = 10%).
    pub discount_bps: i64,
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Input
// =============================================================================

/// A sale as handed over by the till, before persistence.
///
/// `id` is `None` for a brand-new sale. A client-generated id is also
/// accepted; whether the sale is new is decided by the store, not the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDraft {
    pub id: Option<String>,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub lines: Vec<SaleLineDraft>,
    pub payment_method: String,
    pub status: SaleStatus,
    pub total_cents: Option<i64>,
    pub notes: Option<String>,
}

/// One line of a [`SaleDraft`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineDraft {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub lot_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_bps: i64,
}

impl SaleLineDraft {
    /// quantity × unit price, less the percentage discount.
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
            .multiply_quantity(self.quantity)
            .apply_percentage_discount(self.discount_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_status_register_participation() {
        assert!(SaleStatus::Completed.counts_toward_register());
        assert!(SaleStatus::InProgress.counts_toward_register());
        assert!(!SaleStatus::OnHold.counts_toward_register());
        assert!(!SaleStatus::Cancelled.counts_toward_register());
    }

    #[test]
    fn test_sale_status_accepts_till_names() {
        let held: SaleStatus = serde_json::from_str("\"EN_ESPERA\"").unwrap();
        assert_eq!(held, SaleStatus::OnHold);
        let cancelled: SaleStatus = serde_json::from_str("\"CANCELADA\"").unwrap();
        assert_eq!(cancelled, SaleStatus::Cancelled);
        let done: SaleStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(done, SaleStatus::Completed);
    }

    #[test]
    fn test_bindings_use_canonical_names() {
        let status = SaleStatus::inline();
        assert!(status.contains("\"ON_HOLD\""));
        assert!(status.contains("\"CANCELLED\""));
        assert!(!status.contains("EN_ESPERA"));

        let kind = MovementKind::inline();
        assert!(kind.contains("\"OUT\""));
        assert!(!kind.contains("SALIDA"));
    }

    #[test]
    fn test_movement_kind_names() {
        let kind: MovementKind = serde_json::from_str("\"SALIDA\"").unwrap();
        assert_eq!(kind, MovementKind::Out);
        assert_eq!(serde_json::to_string(&MovementKind::Adjust).unwrap(), "\"ADJUST\"");
        assert_eq!(MovementKind::In.to_string(), "IN");
    }

    #[test]
    fn test_line_subtotal_with_discount() {
        let line = SaleLineDraft {
            quantity: 3,
            unit_price_cents: 5000,
            discount_bps: 1000,
            ..Default::default()
        };
        assert_eq!(line.subtotal().cents(), 13_500);
    }

    #[test]
    fn test_lot_expiry() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let lot = Lot {
            id: "lot".into(),
            product_id: "p".into(),
            lot_number: "A-1".into(),
            expires_on: NaiveDate::from_ymd_opt(2026, 10, 1),
            available_quantity: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            sync_version: 0,
        };
        assert!(lot.is_expired(today));
    }
}
