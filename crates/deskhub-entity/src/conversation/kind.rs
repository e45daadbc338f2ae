//! Conversation message kind enumeration.

use serde::{Deserialize, Serialize};

/// The payload shape of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Text with an attachment reference.
    Attachment,
    /// A recorded user action (button click, form submit).
    Action,
}

impl MessageKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Attachment => "attachment",
            Self::Action => "action",
        }
    }
}
