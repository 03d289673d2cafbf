//! # Error Types
//!
//! Domain-specific error types for pharmapos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharmapos-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pharmapos-db errors (separate crate)                                  │
//! │  └── DbError          - Lookups, conflicts, SQL failures               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError::Domain → caller          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stock movement was requested with a quantity its kind does not accept.
    ///
    /// ## When This Occurs
    /// - IN or OUT with a negative quantity (direction comes from the kind)
    /// - A sale line with a negative quantity
    #[error("Invalid quantity {quantity} for {kind} movement")]
    InvalidQuantity { kind: String, quantity: i64 },

    /// An entity is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Closing a cash session that is already closed
    /// - Closing when no session is open
    #[error("{entity} {id} is {state}, cannot {operation}")]
    InvalidState {
        entity: String,
        id: String,
        state: String,
        operation: String,
    },

    /// Payment method outside the known buckets while the register rejects unknowns.
    #[error("Unrecognized payment method: '{0}'")]
    InvalidPaymentMethod(String),

    /// A movement referenced a lot that belongs to another product.
    #[error("Lot {lot_id} does not belong to product {product_id}")]
    LotProductMismatch { lot_id: String, product_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        state: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            state: state.into(),
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
