//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── ValidationError   - malformed checkout input                      │
//! │  └── PaymentShortfall  - tendered amount below total due               │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                   │
//! │  ├── DbError           - storage operation failures                    │
//! │  └── CheckoutError     - full client-facing checkout taxonomy          │
//! │                                                                         │
//! │  Flow: ValidationError/PaymentShortfall → CheckoutError → API layer    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, amounts, ...)
//! 3. Errors are enum variants with typed fields, never bare strings

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Validation Error
// =============================================================================

/// Checkout input validation errors.
///
/// These occur before any business logic or storage access runs; the
/// caller can correct the request and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The cart has no lines.
    #[error("cart must contain at least one line")]
    EmptyCart,

    /// The cart has more lines than a single transaction allows.
    #[error("cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// A numeric field must be strictly positive.
    #[error("{field} must be positive (line {line})")]
    MustBePositive { field: &'static str, line: usize },

    /// A numeric field must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: &'static str },

    /// A single line requests more units than allowed.
    #[error("quantity {requested} exceeds maximum allowed ({max}) on line {line}")]
    QuantityTooLarge {
        requested: i64,
        max: i64,
        line: usize,
    },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// A line discount exceeds the line's gross amount.
    #[error("discount exceeds line amount on line {line}")]
    DiscountExceedsLine { line: usize },

    /// A money computation overflowed i64 cents.
    #[error("monetary amount out of range")]
    AmountOutOfRange,
}

// =============================================================================
// Payment Shortfall
// =============================================================================

/// Tendered amount is below the total due.
///
/// Carries both amounts so the caller can display the exact shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient payment: total {total}, paid {paid}")]
pub struct PaymentShortfall {
    pub total: Money,
    pub paid: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================
