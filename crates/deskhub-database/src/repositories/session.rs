//! Widget contact session repository implementation.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::SessionId;
use deskhub_entity::session::SessionContext;
use deskhub_relay::store::SessionStore;

/// Repository over the `contact_sessions` table.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn find_context(&self, id: SessionId) -> AppResult<Option<SessionContext>> {
        sqlx::query_as::<_, SessionContext>(
            "SELECT s.id AS session_id, s.client_id, s.workspace_id, s.widget_id, \
             s.contact_name, s.contact_email, c.ai_enabled AS client_ai_enabled \
             FROM contact_sessions s \
             INNER JOIN clients c ON c.id = s.client_id \
             WHERE s.id = $1 AND s.deleted_at IS NULL",
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to load session context", e)
        })
    }

    async fn merge_fields(&self, id: SessionId, fields: &Value) -> AppResult<()> {
        sqlx::query(
            "UPDATE contact_sessions \
             SET fields = COALESCE(fields, '{}'::jsonb) || $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id.into_uuid())
        .bind(fields)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to merge session fields", e)
        })?;
        Ok(())
    }
}
