//! Worker lifecycle: a tokio task that sweeps on an interval and stops
//! on request.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::checks::run_sweep;
use crate::config::AlertConfig;
use meridian_db::Database;

/// The background notification consumer.
pub struct AlertWorker {
    db: Database,
    config: AlertConfig,
}

impl AlertWorker {
    /// Creates a worker over the given database handle.
    pub fn new(db: Database, config: AlertConfig) -> Self {
        AlertWorker { db, config }
    }

    /// Spawns the worker task. One sweep runs immediately, then one per
    /// poll interval until shutdown.
    pub fn start(self) -> AlertWorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(
                poll_interval = ?self.config.poll_interval,
                "Alert worker started"
            );

            let mut ticker = tokio::time::interval(self.config.poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // A failed sweep is retried on the next tick.
                        if let Err(err) = run_sweep(&self.db, &self.config).await {
                            error!(error = %err, "Alert sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Alert worker shutting down");
                            break;
                        }
                    }
                }
            }
        });

        AlertWorkerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle to a running worker.
pub struct AlertWorkerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AlertWorkerHandle {
    /// Signals the worker to stop and waits for it to finish.
    pub async fn shutdown(self) {
        // Send fails only if the task already exited.
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Money;
    use meridian_db::{DbConfig, NewProduct};
    use std::time::Duration;

    #[tokio::test]
    async fn test_worker_sweeps_then_shuts_down() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(NewProduct {
                sku: "LOW".to_string(),
                name: "Low product".to_string(),
                description: None,
                cost_cents: Money::from_cents(100),
                price_cents: Money::from_cents(200),
                total_stock: 1,
                low_stock_threshold: 10,
                reorder_level: 20,
                category_id: None,
                supplier_id: None,
            })
            .await
            .unwrap();

        let config = AlertConfig::default().poll_interval(Duration::from_millis(10));
        let handle = AlertWorker::new(db.clone(), config).start();

        // First interval tick fires immediately; give it a moment.
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        // Low stock plus dead stock (on hand, never sold).
        let unread = db.notifications().list_unread(10).await.unwrap();
        assert_eq!(unread.len(), 2);
    }
}
