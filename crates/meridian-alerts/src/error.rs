//! Error types for the notification consumer.

use thiserror::Error;

use meridian_db::DbError;

/// Alerting failures. A failed sweep is logged and retried on the next
/// tick; it never takes the worker down.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Underlying storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for alerting operations.
pub type AlertResult<T> = Result<T, AlertError>;
