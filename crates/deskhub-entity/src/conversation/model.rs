//! Conversation message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::kind::MessageKind;
use super::sender::SenderKind;

/// One persisted message in a ticket's conversation.
///
/// Within a single ticket, rows must reflect publish order: the relay
/// awaits persistence of an inbound message before triggering any
/// downstream publish that could produce a reply row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationMessage {
    /// Unique message identifier.
    pub id: Uuid,
    /// The ticket this message belongs to.
    pub ticket_id: Uuid,
    /// Who authored the message.
    pub sender_kind: SenderKind,
    /// The authoring user (agent or bot user), when known.
    pub sender_id: Option<Uuid>,
    /// The originating widget contact session, for customer messages.
    pub session_id: Option<Uuid>,
    /// Message body text.
    pub body: String,
    /// Payload shape.
    pub message_kind: MessageKind,
    /// Attachment MIME/category, when present.
    pub attachment_type: Option<String>,
    /// Attachment URL, when present.
    pub attachment_url: Option<String>,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to persist a new conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversationMessage {
    /// The ticket this message belongs to.
    pub ticket_id: Uuid,
    /// Who authored the message.
    pub sender_kind: SenderKind,
    /// The authoring user, when known.
    pub sender_id: Option<Uuid>,
    /// The originating widget contact session.
    pub session_id: Option<Uuid>,
    /// Message body text.
    pub body: String,
    /// Payload shape.
    pub message_kind: MessageKind,
    /// Attachment MIME/category.
    pub attachment_type: Option<String>,
    /// Attachment URL.
    pub attachment_url: Option<String>,
}

impl NewConversationMessage {
    /// A text message authored by the customer on the widget side.
    pub fn from_customer(
        ticket_id: Uuid,
        session_id: Option<Uuid>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id,
            sender_kind: SenderKind::User,
            sender_id: None,
            session_id,
            body: body.into(),
            message_kind: MessageKind::Text,
            attachment_type: None,
            attachment_url: None,
        }
    }

    /// A text message authored by a human agent.
    pub fn from_agent(ticket_id: Uuid, agent_id: Option<Uuid>, body: impl Into<String>) -> Self {
        Self {
            ticket_id,
            sender_kind: SenderKind::Agent,
            sender_id: agent_id,
            session_id: None,
            body: body.into(),
            message_kind: MessageKind::Text,
            attachment_type: None,
            attachment_url: None,
        }
    }

    /// A text message authored by a chatbot or the QA pipeline.
    pub fn from_bot(ticket_id: Uuid, bot_user_id: Option<Uuid>, body: impl Into<String>) -> Self {
        Self {
            ticket_id,
            sender_kind: SenderKind::Bot,
            sender_id: bot_user_id,
            session_id: None,
            body: body.into(),
            message_kind: MessageKind::Text,
            attachment_type: None,
            attachment_url: None,
        }
    }

    /// Attach an attachment reference, switching the message kind.
    pub fn with_attachment(mut self, attachment_type: String, attachment_url: String) -> Self {
        self.message_kind = MessageKind::Attachment;
        self.attachment_type = Some(attachment_type);
        self.attachment_url = Some(attachment_url);
        self
    }

    /// Mark the message as a recorded user action.
    pub fn as_action(mut self) -> Self {
        self.message_kind = MessageKind::Action;
        self
    }
}
