//! # Validation Module
//!
//! Input validation for catalog entries, sale lines and register operations.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Till / HTTP layer   - shape and format                        │
//! │  Layer 2: THIS MODULE         - business rules before any write         │
//! │  Layer 3: SQLite              - NOT NULL, UNIQUE, FK, CHECK constraints │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{SaleDraft, SaleLineDraft};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn at_most(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

/// Validates a SKU: 1-50 characters, letters, digits, hyphens, underscores.
///
/// ```rust
/// use pharmapos_core::validation::validate_sku;
///
/// assert!(validate_sku("PARA-500").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    required("sku", sku)?;
    at_most("sku", sku, 50)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name: required, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required("name", name)?;
    at_most("name", name, 200)
}

/// Validates a lot number: required, at most 50 characters.
pub fn validate_lot_number(lot_number: &str) -> ValidationResult<()> {
    required("lot_number", lot_number)?;
    at_most("lot_number", lot_number, 50)
}

/// Validates stock thresholds: non-negative, minimum not above optimal.
pub fn validate_thresholds(min_stock: i64, optimal_stock: i64) -> ValidationResult<()> {
    if min_stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "min_stock".to_string(),
        });
    }
    if optimal_stock < min_stock {
        return Err(ValidationError::OutOfRange {
            field: "optimal_stock".to_string(),
            min: min_stock,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a price in cents. Zero is allowed (samples, promotions).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Sales
// =============================================================================

/// Validates a sale line before it is persisted.
///
/// A negative quantity is `InvalidQuantity` whether or not the line moves stock.
pub fn validate_sale_line(line: &SaleLineDraft) -> CoreResult<()> {
    if line.quantity < 0 {
        return Err(CoreError::InvalidQuantity {
            kind: "OUT".to_string(),
            quantity: line.quantity,
        });
    }

    validate_price_cents(line.unit_price_cents)?;

    if !(0..=10_000).contains(&line.discount_bps) {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 10_000,
        }
        .into());
    }

    Ok(())
}

/// Validates a whole sale: every line, and a total that is absent or not negative.
pub fn validate_sale_draft(draft: &SaleDraft) -> CoreResult<()> {
    if let Some(total) = draft.total_cents {
        if total < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "total".to_string(),
            }
            .into());
        }
    }

    for line in &draft.lines {
        validate_sale_line(line)?;
    }

    Ok(())
}

// =============================================================================
// Register
// =============================================================================

/// Validates a cash withdrawal: positive amount, reason and authorizer present.
pub fn validate_withdrawal(amount: Money, reason: &str, authorized_by: &str) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    required("reason", reason)?;
    at_most("reason", reason, 200)?;
    required("authorized_by", authorized_by)
}

/// Validates the cash counted at close.
pub fn validate_declared_cash(declared: Money) -> ValidationResult<()> {
    if declared.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "declared_cash".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("PARA-500").is_ok());
        assert!(validate_sku("amox_875").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Paracetamol 500mg 20 tabletas").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_thresholds() {
        assert!(validate_thresholds(5, 20).is_ok());
        assert!(validate_thresholds(0, 0).is_ok());
        assert!(validate_thresholds(-1, 20).is_err());
        assert!(validate_thresholds(30, 20).is_err());
    }

    #[test]
    fn test_validate_sale_line() {
        let mut line = SaleLineDraft {
            quantity: 2,
            unit_price_cents: 4550,
            discount_bps: 500,
            ..Default::default()
        };
        assert!(validate_sale_line(&line).is_ok());

        line.discount_bps = 12_000;
        assert!(matches!(
            validate_sale_line(&line),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        line.discount_bps = 0;
        line.unit_price_cents = -1;
        assert!(validate_sale_line(&line).is_err());
    }

    #[test]
    fn test_negative_quantity_rejected_without_product() {
        let line = SaleLineDraft {
            product_id: None,
            quantity: -3,
            unit_price_cents: 100,
            ..Default::default()
        };
        assert!(matches!(
            validate_sale_line(&line),
            Err(CoreError::InvalidQuantity { quantity: -3, .. })
        ));
    }

    #[test]
    fn test_validate_sale_draft_total() {
        let mut draft = SaleDraft {
            total_cents: Some(-300),
            ..Default::default()
        };
        assert!(matches!(
            validate_sale_draft(&draft),
            Err(CoreError::Validation(ValidationError::MustNotBeNegative { field })) if field == "total"
        ));

        draft.total_cents = None;
        assert!(validate_sale_draft(&draft).is_ok());

        draft.total_cents = Some(0);
        draft.lines.push(SaleLineDraft {
            quantity: -1,
            ..Default::default()
        });
        assert!(matches!(
            validate_sale_draft(&draft),
            Err(CoreError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_validate_withdrawal() {
        let amount = Money::from_cents(50_000);
        assert!(validate_withdrawal(amount, "Pago a proveedor", "Supervisor").is_ok());

        assert!(matches!(
            validate_withdrawal(Money::zero(), "x", "y"),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_withdrawal(amount, " ", "y"),
            Err(ValidationError::Required { field }) if field == "reason"
        ));
        assert!(matches!(
            validate_withdrawal(amount, "x", ""),
            Err(ValidationError::Required { field }) if field == "authorized_by"
        ));
    }

    #[test]
    fn test_validate_declared_cash() {
        assert!(validate_declared_cash(Money::zero()).is_ok());
        assert!(validate_declared_cash(Money::from_cents(-1)).is_err());
    }
}
