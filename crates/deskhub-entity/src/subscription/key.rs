//! Composite subscription key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscriber::SubscriberKind;

/// Composite key identifying one logical subscription.
///
/// The persistent store guarantees at most one active record per key, and
/// the in-memory channel registry is indexed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    /// The pub/sub topic name.
    pub channel_name: String,
    /// The owning subscriber's identifier.
    pub subscriber_id: Uuid,
    /// The owning subscriber's kind.
    pub subscriber_kind: SubscriberKind,
}

impl SubscriptionKey {
    /// Create a new subscription key.
    pub fn new(
        channel_name: impl Into<String>,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            subscriber_id,
            subscriber_kind,
        }
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.channel_name, self.subscriber_id, self.subscriber_kind
        )
    }
}
