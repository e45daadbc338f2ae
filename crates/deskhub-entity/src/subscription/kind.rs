//! Channel kind enumeration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The purpose a pub/sub channel serves.
///
/// The kind determines which listener set the channel handler dispatch
/// attaches when a subscription is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "channel_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Widget session channel; carries `new_ticket` requests from a widget.
    WidgetSession,
    /// Widget conversation channel; carries customer messages and actions.
    Conversation,
    /// Agent-facing ticket channel; carries agent replies.
    Ticket,
    /// Chatbot channel pair; carries `user-message` / `bot-response` traffic.
    Chatbot,
    /// Shared document-QA answer channel, filtered per ticket.
    QaResults,
}

impl ChannelKind {
    /// Return the kind as its wire/database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WidgetSession => "widget_session",
            Self::Conversation => "conversation",
            Self::Ticket => "ticket",
            Self::Chatbot => "chatbot",
            Self::QaResults => "qa_results",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = deskhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "widget_session" => Ok(Self::WidgetSession),
            "conversation" => Ok(Self::Conversation),
            "ticket" => Ok(Self::Ticket),
            "chatbot" => Ok(Self::Chatbot),
            "qa_results" => Ok(Self::QaResults),
            _ => Err(deskhub_core::AppError::validation(format!(
                "Invalid channel kind: '{s}'. Expected one of: widget_session, conversation, ticket, chatbot, qa_results"
            ))),
        }
    }
}
