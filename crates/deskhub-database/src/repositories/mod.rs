//! Concrete store implementations over PostgreSQL.
//!
//! Each repository implements one of the relay's persistence ports
//! (`deskhub_relay::store`). SQL lives here and nowhere else.

pub mod chatbot;
pub mod conversation;
pub mod notification;
pub mod session;
pub mod subscription;
pub mod team;
pub mod ticket;
pub mod user;
pub mod widget;

pub use chatbot::ChatbotProfileRepository;
pub use conversation::ConversationRepository;
pub use notification::NotificationRepository;
pub use session::SessionRepository;
pub use subscription::SubscriptionRepository;
pub use team::TeamRepository;
pub use ticket::TicketRepository;
pub use user::UserRepository;
pub use widget::WidgetRepository;
