//! Notification repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::UserId;
use deskhub_entity::notification::{NewNotification, Notification};
use deskhub_relay::store::NotificationStore;

/// Repository over the `notifications` and `notification_recipients`
/// tables.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn create_with_recipients(
        &self,
        notification: &NewNotification,
        recipients: &[UserId],
    ) -> AppResult<Notification> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to begin transaction", e)
        })?;

        let stored = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (kind, entity_id, actor_id, payload) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&notification.kind)
        .bind(notification.entity_id)
        .bind(notification.actor_id)
        .bind(&notification.payload)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to insert notification", e)
        })?;

        let recipient_ids: Vec<uuid::Uuid> =
            recipients.iter().copied().map(UserId::into_uuid).collect();
        sqlx::query(
            "INSERT INTO notification_recipients (notification_id, user_id) \
             SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(stored.id)
        .bind(&recipient_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to insert recipients", e)
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to commit notification", e)
        })?;

        Ok(stored)
    }
}
