//! # Domain Types
//!
//! Core domain types used throughout Meridian POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  ProductBatch   │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──┤  product_id     │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  expiry_date    │   │  invoice_number │       │
//! │  │  total_stock    │   │  quantity       │   │  total_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                        │                │
//! │                        ┌─────────────────┐   ┌─────────▼───────┐       │
//! │                        │ LotAllocation   │◄──┤    SaleItem     │       │
//! │                        │  batch_id, qty  │   │  product_id(FK) │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_number, batch_number) - human-readable
//!
//! ## Relationship Rule
//! Cross-entity references are one-directional identifier columns plus
//! explicit lookup operations. A `SaleItem` holds a `product_id`, never a
//! `Product`; back-references are a query, not an ownership edge.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Enums
// =============================================================================

/// Sale transaction status.
///
/// A sale is created `Completed` by checkout and is immutable afterwards,
/// except for the explicit, separately-authorized transition
/// `Completed → Cancelled | Refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum SaleStatus {
    Completed,
    Pending,
    Cancelled,
    Refunded,
}

/// Payment methods accepted at the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum PaymentMethod {
    Cash,
    /// Mobile money.
    Momo,
    Card,
    BankTransfer,
    /// Customer credit / tab.
    Credit,
}

/// Manual stock-adjustment categories, recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum AdjustmentType {
    Addition,
    Subtraction,
    Correction,
    Damage,
    Return,
}

/// Notification categories raised by the background consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum NotificationKind {
    LowStock,
    OutOfStock,
    Expiry,
    /// Stock on hand but no sales within the configured window.
    DeadStock,
}

/// Notification urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Critical,
}

// =============================================================================
// Product & Batch
// =============================================================================

/// A product available for sale.
///
/// `total_stock` is the authoritative sellable quantity; only the Stock
/// Ledger mutates it (sale deduction, batch receipt, manual adjustment).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Display name shown to cashier and on the sale snapshot.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Purchase cost per unit. Always positive.
    pub cost_cents: Money,

    /// Retail price per unit. Always positive.
    pub price_cents: Money,

    /// Authoritative available quantity. Never negative.
    pub total_stock: i64,

    /// Stock level at or below which the product is flagged low.
    pub low_stock_threshold: i64,

    /// Suggested reorder quantity for purchasing.
    pub reorder_level: i64,

    /// Category identifier (lookup relation, owned elsewhere).
    pub category_id: Option<String>,

    /// Supplier identifier (lookup relation, owned elsewhere).
    pub supplier_id: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An expiry-dated stock lot belonging to exactly one product.
///
/// Batch quantities are consumed first-expiring-first-out at sale time;
/// a quarantined batch is excluded from availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,
    pub batch_number: String,

    /// Units remaining in this lot. Never negative.
    pub quantity: i64,
    pub expiry_date: NaiveDate,

    /// Quarantined lots are excluded from sellable stock.
    pub is_quarantined: bool,
    pub cost_cents: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sale & Items
// =============================================================================

/// Sale transaction header.
///
/// ## Invariants
/// - `total_cents = subtotal_cents - discount_cents + tax_cents`
/// - `amount_paid_cents >= total_cents`
/// - `change_cents = amount_paid_cents - total_cents`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,

    /// Human-readable identifier, unique across all sales,
    /// `PREFIX-YYYYMMDD-SEQ`.
    pub invoice_number: String,
    pub status: SaleStatus,

    pub subtotal_cents: Money,
    pub discount_cents: Money,
    pub tax_cents: Money,
    pub total_cents: Money,
    pub amount_paid_cents: Money,
    pub change_cents: Money,
    pub payment_method: PaymentMethod,

    /// Identifier of the cashier; the user store is external.
    pub cashier_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// A line of a sale. Created together with its sale, never modified.
///
/// ## Snapshot Pattern
/// SKU and name are copied from the product at checkout so the sale
/// record survives later catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    pub sku_snapshot: String,
    pub name_snapshot: String,

    /// Units sold. Always positive.
    pub quantity: i64,
    pub unit_price_cents: Money,
    pub discount_cents: Money,

    /// `unit_price_cents * quantity - discount_cents`.
    pub total_cents: Money,

    pub created_at: DateTime<Utc>,
}

/// Which lot(s) a sale item was filled from. One item may split across
/// several lots when the earliest-expiring lot cannot cover the quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LotAllocation {
    pub id: String,
    pub sale_item_id: String,
    pub batch_id: String,
    pub quantity: i64,
}

/// A sale header together with its lines, as returned by checkout and by
/// the read surface consumed by reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Notifications
// =============================================================================

/// A persisted alert row raised by the notification consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,

    /// Product or batch id this notification refers to.
    pub related_entity_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_serde_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
        assert_eq!(
            serde_json::to_string(&SaleStatus::Refunded).unwrap(),
            "\"refunded\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationKind::LowStock).unwrap(),
            "\"low_stock\""
        );
    }

    #[test]
    fn test_priority_ordering() {
        assert!(NotificationPriority::Critical > NotificationPriority::High);
        assert!(NotificationPriority::High > NotificationPriority::Medium);
    }
}
