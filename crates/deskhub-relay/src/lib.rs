//! # deskhub-relay
//!
//! Real-time conversation routing core for DeskHub. Provides:
//!
//! - Pub/sub transport abstraction with an in-memory implementation
//! - Persistence-backed subscription lifecycle management with an
//!   in-memory channel registry rebuilt on startup
//! - Per-channel-kind listener dispatch (widget session, conversation,
//!   ticket, chatbot, QA results)
//! - Message routing between customer widgets, human agents, and chatbots
//! - Ticket intake with per-team routing strategies
//! - Notification fan-out to personal user channels

pub mod channel;
pub mod dispatch;
pub mod engine;
pub mod intake;
pub mod message;
pub mod notify;
pub mod router;
pub mod routing;
pub mod store;
pub mod subscription;
pub mod tasks;
pub mod transport;

pub use channel::name::ChannelName;
pub use channel::registry::ChannelRegistry;
pub use dispatch::HandlerDispatch;
pub use engine::{RelayEngine, RelayStores};
pub use intake::TicketIntakeService;
pub use notify::{NotificationFanout, Notifier};
pub use router::{ConversationRouter, MessageRouter};
pub use subscription::manager::SubscriptionManager;
pub use transport::{MemoryTransport, PubSubChannel, PubSubTransport};
