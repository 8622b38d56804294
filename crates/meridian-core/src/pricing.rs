//! # Cart Pricing
//!
//! Pure monetary math for a checkout request: line totals, subtotal,
//! grand total and change due.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pricing Pipeline                                 │
//! │                                                                         │
//! │  line_total = unit_price × quantity − line_discount     (per line)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  subtotal = Σ line_total                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total = subtotal − global_discount + tax                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  change = amount_paid − total     (fails if paid < total)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is checked; an overflow is a validation error, never a
//! silently wrong sale row. Availability, persistence and invoice numbers
//! are the storage layer's business - nothing here touches I/O.

use serde::{Deserialize, Serialize};

use crate::error::{PaymentShortfall, ValidationError};
use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Request Types
// =============================================================================

/// One requested line of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,

    /// Absolute discount applied to this line.
    pub discount: Money,
}

/// A submitted cart, as handed to the Sale Transaction Processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Ordered, non-empty sequence of line requests.
    pub lines: Vec<LineRequest>,

    /// Absolute discount applied to the whole sale.
    pub discount: Money,

    /// Absolute tax amount for the whole sale.
    pub tax: Money,

    /// Amount tendered by the customer.
    pub amount_paid: Money,

    pub payment_method: PaymentMethod,
    pub cashier_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Priced Results
// =============================================================================

/// A line with its computed total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,

    /// `unit_price × quantity − discount`.
    pub total: Money,
}

/// Computed totals for a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartTotals {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,

    /// `subtotal − discount + tax`.
    pub total: Money,
}

impl CartTotals {
    /// Verifies the tendered amount covers the total and returns the
    /// change due.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    /// # use meridian_core::pricing::CartTotals;
    /// # let totals = CartTotals {
    /// #     lines: vec![],
    /// #     subtotal: Money::from_cents(2000),
    /// #     discount: Money::from_cents(200),
    /// #     tax: Money::from_cents(100),
    /// #     total: Money::from_cents(1900),
    /// # };
    /// let change = totals.change_for(Money::from_cents(2000)).unwrap();
    /// assert_eq!(change.cents(), 100);
    /// ```
    pub fn change_for(&self, paid: Money) -> Result<Money, PaymentShortfall> {
        if paid < self.total {
            return Err(PaymentShortfall {
                total: self.total,
                paid,
            });
        }
        Ok(paid - self.total)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Prices a checkout request.
///
/// Assumes the request already passed [`crate::validation::validate_checkout`];
/// the only failure left here is checked-arithmetic overflow.
pub fn price_cart(request: &CheckoutRequest) -> Result<CartTotals, ValidationError> {
    let mut lines = Vec::with_capacity(request.lines.len());
    let mut subtotal = Money::zero();

    for line in &request.lines {
        let gross = line
            .unit_price
            .checked_mul_quantity(line.quantity)
            .ok_or(ValidationError::AmountOutOfRange)?;
        let total = gross - line.discount;

        subtotal = subtotal
            .checked_add(total)
            .ok_or(ValidationError::AmountOutOfRange)?;

        lines.push(PricedLine {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount: line.discount,
            total,
        });
    }

    let total = (subtotal - request.discount)
        .checked_add(request.tax)
        .ok_or(ValidationError::AmountOutOfRange)?;

    Ok(CartTotals {
        lines,
        subtotal,
        discount: request.discount,
        tax: request.tax,
        total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
