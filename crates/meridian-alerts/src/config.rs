//! Alert worker configuration.

use std::time::Duration;

/// Configuration for the notification consumer.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// How often the worker sweeps.
    /// Default: 15 minutes
    pub poll_interval: Duration,

    /// Lots expiring within this many days raise a warning.
    /// Default: 30
    pub expiry_warning_days: i64,

    /// Lots expiring within this many days (or already expired) raise a
    /// critical alert instead.
    /// Default: 7
    pub critical_expiry_days: i64,

    /// A product with stock but no sales for this many days is flagged
    /// as dead stock.
    /// Default: 90
    pub dead_stock_days: i64,

    /// Window within which a repeat alert for the same (kind, entity)
    /// is suppressed.
    /// Default: 24 hours
    pub dedup_window: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            poll_interval: Duration::from_secs(15 * 60),
            expiry_warning_days: 30,
            critical_expiry_days: 7,
            dead_stock_days: 90,
            dedup_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl AlertConfig {
    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the expiry warning window in days.
    pub fn expiry_warning_days(mut self, days: i64) -> Self {
        self.expiry_warning_days = days;
        self
    }

    /// Sets the dead-stock window in days.
    pub fn dead_stock_days(mut self, days: i64) -> Self {
        self.dead_stock_days = days;
        self
    }
}
