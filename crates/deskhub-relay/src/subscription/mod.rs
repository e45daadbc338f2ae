//! Subscription lifecycle management.

pub mod manager;

use std::sync::Arc;

use async_trait::async_trait;

use deskhub_core::result::AppResult;
use deskhub_entity::chatbot::ChatbotProfile;
use deskhub_entity::subscription::SubscriptionRecord;

use crate::channel::registry::ChannelListeners;
use crate::transport::PubSubChannel;

pub use manager::{ReplayStats, SubscriptionManager, SubscriptionStats};

/// Attaches the listener set a channel kind requires.
///
/// Implemented by the channel handler dispatch. The manager reference
/// flows per call rather than at construction; listener bodies capture
/// it to subscribe or touch activity from inside an event.
#[async_trait]
pub trait ChannelWiring: Send + Sync {
    /// Wire up listeners for one subscription and return their handles.
    async fn wire(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        profile: Option<&ChatbotProfile>,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<ChannelListeners>;
}
