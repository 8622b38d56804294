//! # Repository Layer
//!
//! One repository per aggregate, each a thin handle over the shared pool:
//!
//! - [`product::ProductRepository`] - catalog read surface + inserts
//! - [`batch::BatchRepository`] - lot read surface
//! - [`stock::StockLedger`] - the only mutation surface for `total_stock`
//! - [`sale::SaleRepository`] - sale read side + status transitions
//! - [`notification::NotificationRepository`] - alert rows
//!
//! Functions with an `_on` suffix take a `&mut SqliteConnection` so the
//! checkout transaction can compose them atomically; the repository
//! structs wrap the same operations for pool-level callers.

pub mod batch;
pub mod notification;
pub mod product;
pub mod sale;
pub mod stock;
