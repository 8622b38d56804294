//! # meridian-alerts: Background Notification Consumer
//!
//! Periodic sweeps over committed inventory state. Each sweep reads
//! through the meridian-db repositories and raises persisted
//! notifications for:
//!
//! - products at or below their low-stock threshold (out-of-stock is
//!   escalated to critical)
//! - non-quarantined lots expiring within the warning window (already
//!   near-expired lots are escalated to critical)
//! - dead stock: products holding units with no sales inside the
//!   configured window
//!
//! ## Position in the System
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   checkout tx ──commit──▶ SQLite ◀──reads── AlertWorker (this crate)   │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                        notifications table              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The worker never joins a checkout transaction; it observes committed
//! state only, so a sale is either fully visible to a sweep or not at
//! all. Duplicate suppression is a 24-hour window per (kind, entity).

pub mod checks;
pub mod config;
pub mod error;
pub mod worker;

pub use checks::run_sweep;
pub use config::AlertConfig;
pub use error::{AlertError, AlertResult};
pub use worker::{AlertWorker, AlertWorkerHandle};
