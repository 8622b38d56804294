//! # Validation Module
//!
//! Checkout request validation for Meridian POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API layer (external)                                         │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  └── Runs before any storage access; failures are client errors        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── CHECK / UNIQUE / FK constraints as the last line of defense       │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::pricing::CheckoutRequest;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a checkout request before pricing or storage access.
///
/// ## Rules
/// - cart non-empty and at most [`MAX_CART_LINES`] lines
/// - every `quantity > 0` and at most [`MAX_LINE_QUANTITY`]
/// - every `unit_price > 0`
/// - every discount (line and global) `>= 0`, and a line discount may not
///   exceed the line's gross amount
/// - `tax >= 0`, `amount_paid >= 0`
/// - `cashier_id` present
pub fn validate_checkout(request: &CheckoutRequest) -> ValidationResult<()> {
    if request.lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    if request.lines.len() > MAX_CART_LINES {
        return Err(ValidationError::CartTooLarge {
            max: MAX_CART_LINES,
        });
    }

    if request.cashier_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "cashier_id",
        });
    }

    for (index, line) in request.lines.iter().enumerate() {
        // 1-based for error messages shown to the cashier
        let line_no = index + 1;

        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id",
            });
        }

        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity",
                line: line_no,
            });
        }

        if line.quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::QuantityTooLarge {
                requested: line.quantity,
                max: MAX_LINE_QUANTITY,
                line: line_no,
            });
        }

        if !line.unit_price.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "unit_price",
                line: line_no,
            });
        }

        if line.discount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "line discount",
            });
        }

        let gross = line
            .unit_price
            .checked_mul_quantity(line.quantity)
            .ok_or(ValidationError::AmountOutOfRange)?;
        if line.discount > gross {
            return Err(ValidationError::DiscountExceedsLine { line: line_no });
        }
    }

    if request.discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative { field: "discount" });
    }

    if request.tax.is_negative() {
        return Err(ValidationError::MustNotBeNegative { field: "tax" });
    }

    if request.amount_paid.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount_paid",
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
