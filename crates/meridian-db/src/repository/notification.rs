//! # Notification Repository
//!
//! Persisted alert rows raised by the background consumer. The
//! `recent_exists` check is what keeps the sweeps from re-raising the
//! same alert every poll interval.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use meridian_core::{Notification, NotificationKind, NotificationPriority};

const NOTIFICATION_COLUMNS: &str = r#"
    id, kind, priority, title, message,
    related_entity_id, is_read, created_at
"#;

/// Fields needed to raise a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    /// Product or batch id this notification refers to; the dedup key
    /// together with `kind`.
    pub related_entity_id: Option<String>,
}

/// Repository for notification rows.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Persists a new notification.
    pub async fn create(&self, new: NewNotification) -> DbResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            priority: new.priority,
            title: new.title,
            message: new.message,
            related_entity_id: new.related_entity_id,
            is_read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, kind, priority, title, message,
                related_entity_id, is_read, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&notification.id)
        .bind(notification.kind)
        .bind(notification.priority)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.related_entity_id)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            kind = ?notification.kind,
            priority = ?notification.priority,
            title = %notification.title,
            "Notification raised"
        );

        Ok(notification)
    }

    /// Whether a notification of the same kind for the same entity was
    /// raised at or after `since`. Read or unread both count; marking an
    /// alert read does not re-arm it within the window.
    pub async fn recent_exists(
        &self,
        kind: NotificationKind,
        related_entity_id: &str,
        since: DateTime<Utc>,
    ) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE kind = ?1 AND related_entity_id = ?2 AND created_at >= ?3
            "#,
        )
        .bind(kind)
        .bind(related_entity_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Lists unread notifications, most urgent and newest first.
    pub async fn list_unread(&self, limit: u32) -> DbResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE is_read = 0
            ORDER BY
                CASE priority
                    WHEN 'critical' THEN 0
                    WHEN 'high' THEN 1
                    WHEN 'medium' THEN 2
                    ELSE 3
                END,
                created_at DESC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Marks a notification as read.
    pub async fn mark_read(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;

    fn low_stock(entity: &str) -> NewNotification {
        NewNotification {
            kind: NotificationKind::LowStock,
            priority: NotificationPriority::High,
            title: "Low stock".to_string(),
            message: "Product is running low".to_string(),
            related_entity_id: Some(entity.to_string()),
        }
    }

    #[tokio::test]
    async fn test_recent_exists_dedup_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.notifications();

        repo.create(low_stock("product-1")).await.unwrap();

        let day_ago = Utc::now() - Duration::hours(24);
        assert!(repo
            .recent_exists(NotificationKind::LowStock, "product-1", day_ago)
            .await
            .unwrap());
        // Different kind or entity does not suppress.
        assert!(!repo
            .recent_exists(NotificationKind::Expiry, "product-1", day_ago)
            .await
            .unwrap());
        assert!(!repo
            .recent_exists(NotificationKind::LowStock, "product-2", day_ago)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unread_ordering_and_mark_read() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.notifications();

        repo.create(low_stock("p1")).await.unwrap();
        let critical = repo
            .create(NewNotification {
                kind: NotificationKind::OutOfStock,
                priority: NotificationPriority::Critical,
                title: "Out of stock".to_string(),
                message: "Zero units left".to_string(),
                related_entity_id: Some("p2".to_string()),
            })
            .await
            .unwrap();

        let unread = repo.list_unread(10).await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].id, critical.id);

        repo.mark_read(&critical.id).await.unwrap();
        let unread = repo.list_unread(10).await.unwrap();
        assert_eq!(unread.len(), 1);
    }
}
