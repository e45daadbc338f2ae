//! User repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::{ClientId, UserId};
use deskhub_entity::user::User;
use deskhub_relay::store::UserStore;

/// Repository over the `users` table.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to find user", e))
    }

    async fn find_bot_agent(&self, client_id: ClientId) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users \
             WHERE client_id = $1 AND is_bot AND deleted_at IS NULL \
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(client_id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to find bot agent", e))
    }
}
