//! Conversation message repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::TicketId;
use deskhub_entity::conversation::{ConversationMessage, NewConversationMessage};
use deskhub_relay::store::ConversationStore;

/// Repository over the `conversation_messages` table.
#[derive(Debug, Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn insert(&self, message: &NewConversationMessage) -> AppResult<ConversationMessage> {
        sqlx::query_as::<_, ConversationMessage>(
            "INSERT INTO conversation_messages \
             (ticket_id, sender_kind, sender_id, session_id, body, message_kind, \
              attachment_type, attachment_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(message.ticket_id)
        .bind(message.sender_kind)
        .bind(message.sender_id)
        .bind(message.session_id)
        .bind(&message.body)
        .bind(message.message_kind)
        .bind(&message.attachment_type)
        .bind(&message.attachment_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to insert conversation message", e)
        })
    }

    async fn list_by_ticket(&self, ticket_id: TicketId) -> AppResult<Vec<ConversationMessage>> {
        sqlx::query_as::<_, ConversationMessage>(
            "SELECT * FROM conversation_messages WHERE ticket_id = $1 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(ticket_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to list conversation messages", e)
        })
    }
}
