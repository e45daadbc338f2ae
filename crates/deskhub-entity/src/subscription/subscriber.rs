//! Subscriber kind enumeration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The logical identity class that owns a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscriber_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriberKind {
    /// A widget contact session (a customer).
    Session,
    /// A human support agent.
    Agent,
    /// A chatbot instance.
    Chatbot,
}

impl SubscriberKind {
    /// Return the kind as its wire/database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Agent => "agent",
            Self::Chatbot => "chatbot",
        }
    }
}

impl std::fmt::Display for SubscriberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriberKind {
    type Err = deskhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "agent" => Ok(Self::Agent),
            "chatbot" => Ok(Self::Chatbot),
            _ => Err(deskhub_core::AppError::validation(format!(
                "Invalid subscriber kind: '{s}'. Expected one of: session, agent, chatbot"
            ))),
        }
    }
}
