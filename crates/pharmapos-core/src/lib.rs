//! # pharmapos-core: Pure Business Logic for PharmaPOS
//!
//! Domain types and the arithmetic behind every stock and cash change,
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PharmaPOS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Point-of-sale frontend / HTTP layer             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pharmapos-db (services)                      │   │
//! │  │     StockLedger • CashRegister • SaleCompletion • UnitOfWork    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ pharmapos-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   stock   │  │ register  │  │ validation│  │   │
//! │  │   │  Product  │  │ Transition│  │CashSession│  │   rules   │  │   │
//! │  │   │  Sale     │  │  replay   │  │  buckets  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Lot, InventoryMovement, CashSession, Sale)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`stock`] - Stock transitions with the zero floor
//! - [`register`] - Cash session accumulation, withdrawals and close math
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use pharmapos_core::stock::StockTransition;
//! use pharmapos_core::MovementKind;
//!
//! // Selling 5 units with only 3 on the shelf floors the stock at zero
//! let t = StockTransition::compute(Some(3), MovementKind::Out, 5).unwrap();
//! assert_eq!((t.before, t.after), (3, 0));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod register;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Opening float for a lazily created cash session, in cents ($1,000.00).
pub const DEFAULT_OPENING_FUND_CENTS: i64 = 100_000;

/// Register number used when none is configured.
pub const DEFAULT_REGISTER_NUMBER: i64 = 1;

/// Reason recorded on every stock-out movement emitted by a sale.
pub const SALE_MOVEMENT_REASON: &str = "Venta";

/// Builds the movement reference that points back at a sale.
pub fn sale_reference(sale_id: &str) -> String {
    format!("Venta ID: {}", sale_id)
}
