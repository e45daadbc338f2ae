//! Channel subscription repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::{SubscriptionId, TicketId};
use deskhub_entity::subscription::{
    ChannelKind, NewSubscription, SubscriberKind, SubscriptionKey, SubscriptionPatch,
    SubscriptionRecord,
};
use deskhub_relay::store::SubscriptionStore;

/// Repository over the `channel_subscriptions` table.
///
/// The table carries a partial unique index on
/// `(channel_name, subscriber_id, subscriber_kind) WHERE is_active`, so a
/// concurrent duplicate insert surfaces as a conflict error rather than a
/// second active row.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_latest_by_key(
        &self,
        key: &SubscriptionKey,
    ) -> AppResult<Option<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions \
             WHERE channel_name = $1 AND subscriber_id = $2 AND subscriber_kind = $3 \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(&key.channel_name)
        .bind(key.subscriber_id)
        .bind(key.subscriber_kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to find subscription by key", e)
        })
    }

    async fn find_active_by_key(
        &self,
        key: &SubscriptionKey,
    ) -> AppResult<Option<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions \
             WHERE channel_name = $1 AND subscriber_id = $2 AND subscriber_kind = $3 \
             AND is_active LIMIT 1",
        )
        .bind(&key.channel_name)
        .bind(key.subscriber_id)
        .bind(key.subscriber_kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to find active subscription", e)
        })
    }

    async fn insert(&self, subscription: &NewSubscription) -> AppResult<SubscriptionRecord> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "INSERT INTO channel_subscriptions \
             (channel_name, channel_kind, subscriber_id, subscriber_kind, \
              ticket_id, session_id, workspace_id, client_id, chatbot_profile_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, '{}'::jsonb)) \
             RETURNING *",
        )
        .bind(&subscription.channel_name)
        .bind(subscription.channel_kind)
        .bind(subscription.subscriber_id)
        .bind(subscription.subscriber_kind)
        .bind(subscription.ticket_id)
        .bind(subscription.session_id)
        .bind(subscription.workspace_id)
        .bind(subscription.client_id)
        .bind(subscription.chatbot_profile_id)
        .bind(subscription.metadata.as_ref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    async fn reactivate(
        &self,
        id: SubscriptionId,
        patch: &SubscriptionPatch,
    ) -> AppResult<SubscriptionRecord> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "UPDATE channel_subscriptions SET \
             is_active = TRUE, \
             ticket_id = COALESCE($2, ticket_id), \
             session_id = COALESCE($3, session_id), \
             workspace_id = COALESCE($4, workspace_id), \
             client_id = COALESCE($5, client_id), \
             chatbot_profile_id = COALESCE($6, chatbot_profile_id), \
             metadata = COALESCE($7, metadata), \
             last_activity = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.into_uuid())
        .bind(patch.ticket_id)
        .bind(patch.session_id)
        .bind(patch.workspace_id)
        .bind(patch.client_id)
        .bind(patch.chatbot_profile_id)
        .bind(patch.metadata.as_ref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to reactivate subscription", e)
        })
    }

    async fn deactivate(&self, id: SubscriptionId) -> AppResult<Option<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "UPDATE channel_subscriptions SET is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to deactivate subscription", e)
        })
    }

    async fn deactivate_for_subscriber(
        &self,
        subscriber_id: uuid::Uuid,
        subscriber_kind: SubscriberKind,
        exclude_ticket: Option<TicketId>,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "UPDATE channel_subscriptions SET is_active = FALSE, updated_at = NOW() \
             WHERE subscriber_id = $1 AND subscriber_kind = $2 AND is_active \
             AND ($3::uuid IS NULL OR ticket_id IS DISTINCT FROM $3) \
             RETURNING *",
        )
        .bind(subscriber_id)
        .bind(subscriber_kind)
        .bind(exclude_ticket.map(TicketId::into_uuid))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "failed to deactivate subscriber subscriptions",
                e,
            )
        })
    }

    async fn list_active(&self) -> AppResult<Vec<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions WHERE is_active ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to list active subscriptions", e)
        })
    }

    async fn list_active_by_channel(
        &self,
        channel_name: &str,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions \
             WHERE channel_name = $1 AND is_active ORDER BY created_at ASC",
        )
        .bind(channel_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "failed to list channel subscriptions",
                e,
            )
        })
    }

    async fn list_active_by_subscriber(
        &self,
        subscriber_id: uuid::Uuid,
        subscriber_kind: SubscriberKind,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions \
             WHERE subscriber_id = $1 AND subscriber_kind = $2 AND is_active \
             ORDER BY created_at ASC",
        )
        .bind(subscriber_id)
        .bind(subscriber_kind)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "failed to list subscriber subscriptions",
                e,
            )
        })
    }

    async fn list_active_by_ticket(
        &self,
        ticket_id: TicketId,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions \
             WHERE ticket_id = $1 AND is_active ORDER BY created_at ASC",
        )
        .bind(ticket_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to list ticket subscriptions", e)
        })
    }

    async fn list_stale_inactive(
        &self,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM channel_subscriptions \
             WHERE NOT is_active AND last_activity < $1 ORDER BY last_activity ASC",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "failed to list stale inactive subscriptions",
                e,
            )
        })
    }

    async fn touch_activity(&self, id: SubscriptionId) -> AppResult<()> {
        sqlx::query(
            "UPDATE channel_subscriptions SET last_activity = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to touch subscription", e)
        })?;
        Ok(())
    }

    async fn count_active_by_kind(&self) -> AppResult<Vec<(ChannelKind, i64)>> {
        sqlx::query_as::<_, (ChannelKind, i64)>(
            "SELECT channel_kind, COUNT(*) FROM channel_subscriptions \
             WHERE is_active GROUP BY channel_kind ORDER BY channel_kind",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to count subscriptions", e)
        })
    }
}

/// A violation of the active-key unique index means the key is already
/// subscribed; everything else is a plain database failure.
fn map_insert_error(e: sqlx::Error) -> AppError {
    if let Some(db_error) = e.as_database_error() {
        if db_error.is_unique_violation() {
            return AppError::conflict("subscription already active for this key");
        }
    }
    AppError::with_source(ErrorKind::Database, "failed to insert subscription", e)
}
