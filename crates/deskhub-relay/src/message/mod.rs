//! Wire message envelopes and ingress payload normalization.

pub mod envelope;
pub mod normalize;

pub use envelope::{
    BotResponse, MessageReply, NewTicketReply, NotificationEvent, QaQuery, QaResult, UserAction,
    UserActionKind, UserMessage, WidgetMessage, wire_sender_type,
};
pub use normalize::{extract_text, normalize_payload};

/// Customer / agent message traffic on conversation and ticket channels.
pub const EVENT_MESSAGE: &str = "message";

/// Server-to-widget reply relay on widget conversation channels.
pub const EVENT_MESSAGE_REPLY: &str = "message_reply";

/// New-ticket request on widget session channels.
pub const EVENT_NEW_TICKET: &str = "new_ticket";

/// New-ticket acknowledgement on contact-event channels.
pub const EVENT_NEW_TICKET_REPLY: &str = "new_ticket_reply";

/// Structured customer action on widget conversation channels.
pub const EVENT_USER_ACTION: &str = "user_action";

/// Customer message forwarded onto a chatbot channel.
pub const EVENT_USER_MESSAGE: &str = "user-message";

/// Chatbot reply on a chatbot channel.
pub const EVENT_BOT_RESPONSE: &str = "bot-response";

/// Query published on the shared document-QA channel.
pub const EVENT_QA_QUERY: &str = "query";
