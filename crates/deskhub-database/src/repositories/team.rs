//! Team repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::{TeamId, WorkspaceId};
use deskhub_entity::team::Team;
use deskhub_entity::user::User;
use deskhub_relay::store::TeamStore;

/// Repository over the `teams` and `team_members` tables.
#[derive(Debug, Clone)]
pub struct TeamRepository {
    pool: PgPool,
}

impl TeamRepository {
    /// Create a new team repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamStore for TeamRepository {
    async fn find_channel_team(
        &self,
        workspace_id: WorkspaceId,
        channel: &str,
    ) -> AppResult<Option<Team>> {
        sqlx::query_as::<_, Team>(
            "SELECT * FROM teams \
             WHERE workspace_id = $1 AND channel = $2 AND deleted_at IS NULL \
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(workspace_id.into_uuid())
        .bind(channel)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to find channel team", e))
    }

    async fn list_members(&self, team_id: TeamId) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT u.* FROM users u \
             INNER JOIN team_members tm ON tm.user_id = u.id \
             WHERE tm.team_id = $1 AND u.deleted_at IS NULL \
             ORDER BY u.id ASC",
        )
        .bind(team_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to list team members", e))
    }
}
