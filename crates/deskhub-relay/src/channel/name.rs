//! Typed channel names and parsing.

use uuid::Uuid;

use deskhub_core::types::id::{ChatbotProfileId, SessionId, TicketId, UserId};

/// Shared channel carrying document-QA queries to the QA pipeline.
pub const DOCUMENT_QA: &str = "document-qa";

/// Shared channel carrying document-QA answers back, filtered per ticket.
pub const DOCUMENT_QA_RESULTS: &str = "document-qa:results";

/// Prefix of widget conversation channel names; the remainder is the
/// ticket id.
pub const WIDGET_CONVERSATION_PREFIX: &str = "widget:conversation:ticket-";

/// Typed channel identifiers.
///
/// Channel names encode purpose and scope; every name the relay produces
/// or consumes round-trips through this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Widget session channel; carries `new_ticket` requests.
    WidgetSession(SessionId),
    /// Widget conversation channel for one ticket; carries customer
    /// messages, user actions, and `message_reply` events.
    WidgetConversation(TicketId),
    /// Agent-facing ticket channel.
    Ticket(TicketId),
    /// Chatbot channel for one (profile, ticket) pairing.
    Chatbot {
        /// The chatbot profile.
        profile_id: ChatbotProfileId,
        /// The ticket the bot conversation belongs to.
        ticket_id: TicketId,
    },
    /// Per-session contact event channel; carries `new_ticket_reply`.
    ContactEvent(SessionId),
    /// Personal user channel; carries notifications.
    User(UserId),
    /// Shared document-QA query channel.
    DocumentQa,
    /// Shared document-QA answer channel.
    QaResults,
}

impl ChannelName {
    /// Parse a channel string into a typed channel name.
    pub fn parse(channel: &str) -> Option<Self> {
        match channel {
            DOCUMENT_QA => return Some(Self::DocumentQa),
            DOCUMENT_QA_RESULTS => return Some(Self::QaResults),
            _ => {}
        }

        let parts: Vec<&str> = channel.split(':').collect();
        match parts.as_slice() {
            ["widget", "session", id] => parse_uuid(id).map(|u| Self::WidgetSession(u.into())),
            ["widget", "conversation", rest] => rest
                .strip_prefix("ticket-")
                .and_then(parse_uuid)
                .map(|u| Self::WidgetConversation(u.into())),
            ["widget", "contactevent", id] => parse_uuid(id).map(|u| Self::ContactEvent(u.into())),
            ["ticket", id] => parse_uuid(id).map(|u| Self::Ticket(u.into())),
            ["chatbot", profile, ticket] => match (parse_uuid(profile), parse_uuid(ticket)) {
                (Some(p), Some(t)) => Some(Self::Chatbot {
                    profile_id: p.into(),
                    ticket_id: t.into(),
                }),
                _ => None,
            },
            ["user", id] => parse_uuid(id).map(|u| Self::User(u.into())),
            _ => None,
        }
    }

    /// The ticket this channel is scoped to, if any.
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            Self::WidgetConversation(t) | Self::Ticket(t) => Some(*t),
            Self::Chatbot { ticket_id, .. } => Some(*ticket_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WidgetSession(id) => write!(f, "widget:session:{id}"),
            Self::WidgetConversation(id) => write!(f, "{WIDGET_CONVERSATION_PREFIX}{id}"),
            Self::Ticket(id) => write!(f, "ticket:{id}"),
            Self::Chatbot {
                profile_id,
                ticket_id,
            } => write!(f, "chatbot:{profile_id}:{ticket_id}"),
            Self::ContactEvent(id) => write!(f, "widget:contactevent:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::DocumentQa => write!(f, "{DOCUMENT_QA}"),
            Self::QaResults => write!(f, "{DOCUMENT_QA_RESULTS}"),
        }
    }
}

fn parse_uuid(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}
