//! # meridian-db: Storage Layer for Meridian POS
//!
//! SQLite persistence and the checkout transaction for the Meridian
//! retail backend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                meridian-core (pure business logic)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ meridian-db (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   pool    │  │ checkout  │  │  invoice  │  │repository │  │   │
//! │  │   │ Database  │  │  service  │  │ sequencer │  │  product  │  │   │
//! │  │   │ DbConfig  │  │ one sale =│  │ per-day   │  │ sale stock│  │   │
//! │  │   │ WAL mode  │  │ one tx    │  │ counter   │  │ batch ... │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Contract
//! Correctness under concurrent checkouts rests on three SQL shapes, not
//! on application locks:
//!
//! 1. Conditional stock decrement (`... AND total_stock >= ?qty`)
//! 2. Per-day invoice counter upsert inside the sale transaction
//! 3. `UNIQUE(invoice_number)` as the collision backstop, with a bounded
//!    retry in the checkout service
//!
//! ## Usage
//! ```rust,ignore
//! use meridian_db::{CheckoutConfig, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("/var/lib/meridian/pos.db")).await?;
//! let checkout = db.checkout(CheckoutConfig::default());
//! let sale = checkout.process(request).await?;
//! ```

pub mod checkout;
pub mod error;
pub mod invoice;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use checkout::{CheckoutConfig, CheckoutError, CheckoutService};
pub use error::{DbError, DbResult};
pub use invoice::InvoiceSequencer;
pub use pool::{Database, DbConfig};
pub use repository::batch::{BatchRepository, NewBatch};
pub use repository::notification::{NewNotification, NotificationRepository};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::sale::SaleRepository;
pub use repository::stock::{StockDeduction, StockLedger};
