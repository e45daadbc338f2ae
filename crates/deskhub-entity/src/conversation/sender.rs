//! Conversation sender kind enumeration.

use serde::{Deserialize, Serialize};

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sender_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// The customer on the widget side.
    User,
    /// A human support agent.
    Agent,
    /// A chatbot or the QA pipeline.
    Bot,
}

impl SenderKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Bot => "bot",
        }
    }
}
