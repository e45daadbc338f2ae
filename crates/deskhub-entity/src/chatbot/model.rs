//! Chatbot profile entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Configuration of one chatbot instance.
///
/// Resolved before a `chatbot` channel subscription is wired: the
/// bot-response listener persists replies under the bot's owner user and
/// display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatbotProfile {
    /// Unique profile identifier.
    pub id: Uuid,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Display name shown to customers.
    pub display_name: String,
    /// The bot-agent user rows are attributed to, when configured.
    pub owner_user_id: Option<Uuid>,
    /// Webhook URL of the bot runtime, when it is reached over HTTP
    /// instead of (or in addition to) the chatbot channel.
    pub webhook_url: Option<String>,
    /// Whether the profile is currently enabled.
    pub enabled: bool,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}
