//! Channel subscription domain entities.

pub mod key;
pub mod kind;
pub mod model;
pub mod subscriber;

pub use key::SubscriptionKey;
pub use kind::ChannelKind;
pub use model::{NewSubscription, SubscriptionPatch, SubscriptionRecord, merge_metadata};
pub use subscriber::SubscriberKind;
