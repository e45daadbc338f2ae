//! Conversation message domain entities.

pub mod kind;
pub mod model;
pub mod sender;

pub use kind::MessageKind;
pub use model::{ConversationMessage, NewConversationMessage};
pub use sender::SenderKind;
