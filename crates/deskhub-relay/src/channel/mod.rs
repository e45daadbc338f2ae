//! Channel naming and the in-memory registry of live subscriptions.

pub mod name;
pub mod registry;

pub use name::ChannelName;
pub use registry::{ActiveChannel, ChannelListeners, ChannelRegistry};
