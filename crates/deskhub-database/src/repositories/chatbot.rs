//! Chatbot profile repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::ChatbotProfileId;
use deskhub_entity::chatbot::ChatbotProfile;
use deskhub_relay::store::ChatbotProfileStore;

/// Repository over the `chatbot_profiles` table.
#[derive(Debug, Clone)]
pub struct ChatbotProfileRepository {
    pool: PgPool,
}

impl ChatbotProfileRepository {
    /// Create a new chatbot profile repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatbotProfileStore for ChatbotProfileRepository {
    async fn find_by_id(&self, id: ChatbotProfileId) -> AppResult<Option<ChatbotProfile>> {
        sqlx::query_as::<_, ChatbotProfile>(
            "SELECT * FROM chatbot_profiles WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to find chatbot profile", e)
        })
    }
}
