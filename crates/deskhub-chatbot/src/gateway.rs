//! Chatbot gateway trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deskhub_core::result::AppResult;
use deskhub_entity::chatbot::ChatbotProfile;

/// A customer question forwarded to a bot runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendQuestion {
    /// The question text.
    pub content: String,
    /// The ticket the question belongs to.
    pub ticket_id: Uuid,
    /// The originating widget contact session, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Interface to the external chatbot/LLM runtime.
///
/// Implementations are fire-and-forget from the relay's perspective:
/// a delivery failure is logged by the caller and the conversation is
/// never rolled back.
#[async_trait]
pub trait ChatbotGateway: Send + Sync {
    /// Forward a customer question to the runtime behind `profile`.
    async fn send_question(&self, profile: &ChatbotProfile, question: &SendQuestion)
    -> AppResult<()>;
}
