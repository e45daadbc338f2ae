//! Wire envelopes.
//!
//! Field names here are the contract other parts of the platform (widget
//! bundle, agent dashboard, bot runtimes) rely on. All envelopes use
//! camelCase on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deskhub_entity::conversation::SenderKind;

/// Inbound widget `message` event payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetMessage {
    /// Message text (preferred field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Message text (legacy field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attachment MIME/category, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    /// Attachment URL, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
}

/// Outbound `message_reply` event payload (server to widget).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReply {
    /// The ticket the reply belongs to.
    pub ticket_id: Uuid,
    /// The persisted conversation row id, when persistence succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// The reply text.
    pub message: String,
    /// Payload shape tag; currently always `"text"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Sender tag: `"agent"`, `"ai"`, or `"user"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<String>,
    /// The widget contact session the reply targets.
    pub session_id: Option<Uuid>,
    /// Alias of `id` kept for older widget bundles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    /// Relay direction tag, e.g. `"agent"` or `"bot"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Relay direction tag, e.g. `"customer"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl MessageReply {
    /// Build a text reply envelope.
    pub fn text(
        ticket_id: Uuid,
        message: impl Into<String>,
        sender: SenderKind,
        session_id: Option<Uuid>,
    ) -> Self {
        Self {
            ticket_id,
            id: None,
            message: message.into(),
            message_type: Some("text".to_string()),
            sender_type: Some(wire_sender_type(sender).to_string()),
            session_id,
            conversation_id: None,
            from: None,
            to: None,
        }
    }

    /// Attach the persisted conversation row id.
    pub fn with_conversation(mut self, conversation_id: Uuid) -> Self {
        self.id = Some(conversation_id);
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Attach relay direction tags.
    pub fn with_direction(mut self, from: &str, to: &str) -> Self {
        self.from = Some(from.to_string());
        self.to = Some(to.to_string());
        self
    }
}

/// The wire sender tag for a persisted sender kind.
pub fn wire_sender_type(sender: SenderKind) -> &'static str {
    match sender {
        SenderKind::User => "user",
        SenderKind::Agent => "agent",
        SenderKind::Bot => "ai",
    }
}

/// Outbound `new_ticket_reply` event on the session's contact channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicketReply {
    /// The created ticket.
    pub ticket_id: Uuid,
    /// The originating session.
    pub session_id: Uuid,
}

/// Customer message forwarded onto a chatbot channel (`user-message`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    /// The message text.
    pub content: String,
    /// The ticket the conversation belongs to.
    pub ticket_id: Uuid,
    /// The originating widget contact session.
    pub session_id: Option<Uuid>,
}

/// Chatbot reply payload (`bot-response`).
///
/// Observed producers put the reply text under either `content` or
/// `data`; both are accepted and read through one canonical accessor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotResponse {
    /// Reply text (preferred field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reply text (variant field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl BotResponse {
    /// The reply text: `content` first, then `data`. Blank text counts
    /// as absent. The extracted value is the single text both persisted
    /// and forwarded.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.data.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    }
}

/// Query published on the shared `document-qa` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaQuery {
    /// The raw customer question.
    pub query: String,
    /// The ticket the question belongs to; echoed back in results.
    pub id: Uuid,
    /// The owning client, for per-tenant document scoping.
    pub client_id: Uuid,
}

/// Answer payload observed on the shared QA results channel.
///
/// The channel is shared across tickets; listeners only act when `id`
/// matches their own ticket and an answer is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaResult {
    /// The ticket the answer belongs to, as sent by the QA pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// The answer text, when the pipeline produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Recognized `user_action` kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserActionKind {
    /// Data-collection form submission.
    DataCollection,
    /// Action button click.
    ActionButton,
    /// CSAT rating submission.
    Csat,
}

/// Inbound `user_action` event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAction {
    /// Which action flow to run.
    pub action: UserActionKind,
    /// Submitted form fields (`data_collection`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
    /// Button label (`action_button`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Button value (`action_button`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Submitted rating (`csat`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i16>,
}

/// Payload of the `notification` event pushed to personal user channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// The persisted notification id.
    pub id: Uuid,
    /// Event kind, e.g. `"new_ticket"`.
    pub kind: String,
    /// The entity the notification is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    /// Structured payload.
    pub payload: serde_json::Value,
}
