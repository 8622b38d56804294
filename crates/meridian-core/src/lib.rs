//! # meridian-core: Pure Business Logic for Meridian POS
//!
//! This crate is the **heart** of the Meridian retail backend. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             API / CRUD layer (external collaborator)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ meridian-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ CartTotals│  │   rules   │  │   │
//! │  │   │   Sale    │  │ cents i64 │  │ price_cart│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  meridian-db (Storage Layer)                    │   │
//! │  │        SQLite queries, migrations, checkout transaction         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, ProductBatch, Sale, SaleItem, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Cart pricing: line totals, subtotal, total, change due
//! - [`validation`] - Checkout request validation
//! - [`roles`] - Explicit role ranking table for authorization collaborators
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

pub mod error;
pub mod money;
pub mod pricing;
pub mod roles;
pub mod types;
pub mod validation;

pub use error::{PaymentShortfall, ValidationError};
pub use money::Money;
pub use pricing::{price_cart, CartTotals, CheckoutRequest, LineRequest, PricedLine};
pub use roles::Role;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout request.
///
/// Prevents runaway carts and keeps a single transaction's row count
/// bounded. Can be made configurable per store in a future version.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line in a checkout request.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
