//! The sweeps themselves, callable without a worker so tests (and a
//! future "check now" admin action) can run them synchronously.

use chrono::Utc;
use tracing::{debug, info};

use crate::config::AlertConfig;
use crate::error::AlertResult;
use meridian_core::{NotificationKind, NotificationPriority};
use meridian_db::{Database, NewNotification};

fn dedup_cutoff(config: &AlertConfig) -> chrono::Duration {
    chrono::Duration::from_std(config.dedup_window).unwrap_or_else(|_| chrono::Duration::hours(24))
}

/// Runs the low-stock, expiry and dead-stock sweeps once. Returns the
/// number of notifications raised.
pub async fn run_sweep(db: &Database, config: &AlertConfig) -> AlertResult<usize> {
    let mut raised = 0;
    raised += run_low_stock_check(db, config).await?;
    raised += run_expiry_check(db, config).await?;
    raised += run_dead_stock_check(db, config).await?;

    if raised > 0 {
        info!(raised, "Alert sweep raised notifications");
    } else {
        debug!("Alert sweep found nothing new");
    }

    Ok(raised)
}

/// Flags active products at or below their low-stock threshold.
/// Zero stock escalates from a high-priority low-stock alert to a
/// critical out-of-stock alert.
pub async fn run_low_stock_check(db: &Database, config: &AlertConfig) -> AlertResult<usize> {
    let notifications = db.notifications();
    let since = Utc::now() - dedup_cutoff(config);
    let mut raised = 0;

    for product in db.products().list_low_stock().await? {
        let (kind, priority, title, message) = if product.total_stock == 0 {
            (
                NotificationKind::OutOfStock,
                NotificationPriority::Critical,
                format!("Out of stock: {}", product.name),
                format!("{} ({}) has no units left", product.name, product.sku),
            )
        } else {
            (
                NotificationKind::LowStock,
                NotificationPriority::High,
                format!("Low stock: {}", product.name),
                format!(
                    "{} ({}) is down to {} units (threshold {})",
                    product.name, product.sku, product.total_stock, product.low_stock_threshold
                ),
            )
        };

        if notifications.recent_exists(kind, &product.id, since).await? {
            continue;
        }

        notifications
            .create(NewNotification {
                kind,
                priority,
                title,
                message,
                related_entity_id: Some(product.id.clone()),
            })
            .await?;
        raised += 1;
    }

    Ok(raised)
}

/// Flags non-quarantined lots with remaining quantity that expire within
/// the warning window. Lots inside the critical window (or already past
/// expiry) are raised critical.
pub async fn run_expiry_check(db: &Database, config: &AlertConfig) -> AlertResult<usize> {
    let notifications = db.notifications();
    let since = Utc::now() - dedup_cutoff(config);
    let today = Utc::now().date_naive();
    let mut raised = 0;

    for batch in db
        .batches()
        .list_expiring(today, config.expiry_warning_days)
        .await?
    {
        let days_left = (batch.expiry_date - today).num_days();
        let priority = if days_left <= config.critical_expiry_days {
            NotificationPriority::Critical
        } else {
            NotificationPriority::High
        };

        if notifications
            .recent_exists(NotificationKind::Expiry, &batch.id, since)
            .await?
        {
            continue;
        }

        let message = if days_left < 0 {
            format!(
                "Batch {} expired {} days ago with {} units remaining",
                batch.batch_number,
                -days_left,
                batch.quantity
            )
        } else {
            format!(
                "Batch {} expires in {} days with {} units remaining",
                batch.batch_number, days_left, batch.quantity
            )
        };

        notifications
            .create(NewNotification {
                kind: NotificationKind::Expiry,
                priority,
                title: format!("Expiring lot: {}", batch.batch_number),
                message,
                related_entity_id: Some(batch.id.clone()),
            })
            .await?;
        raised += 1;
    }

    Ok(raised)
}

/// Flags active products holding stock with no sales inside the
/// dead-stock window: tied-up capital the purchaser should see.
pub async fn run_dead_stock_check(db: &Database, config: &AlertConfig) -> AlertResult<usize> {
    let notifications = db.notifications();
    let since = Utc::now() - dedup_cutoff(config);
    let window_start = Utc::now() - chrono::Duration::days(config.dead_stock_days);
    let mut raised = 0;

    for product in db.products().list_dead_stock(window_start).await? {
        if notifications
            .recent_exists(NotificationKind::DeadStock, &product.id, since)
            .await?
        {
            continue;
        }

        notifications
            .create(NewNotification {
                kind: NotificationKind::DeadStock,
                priority: NotificationPriority::Medium,
                title: format!("Dead stock: {}", product.name),
                message: format!(
                    "{} ({}) has {} units on hand with no sales in {} days",
                    product.name, product.sku, product.total_stock, config.dead_stock_days
                ),
                related_entity_id: Some(product.id.clone()),
            })
            .await?;
        raised += 1;
    }

    Ok(raised)
}

// =============================================================================
// Unit Tests
// =============================================================================
