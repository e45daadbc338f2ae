//! In-memory registry of live channel subscriptions.

use std::sync::Arc;

use dashmap::DashMap;

use deskhub_entity::subscription::{SubscriptionKey, SubscriptionRecord};

use crate::transport::{ListenerHandle, PubSubChannel};

/// Listener handles attached for one subscription.
///
/// Most channel kinds attach listeners on the subscription's own channel.
/// The `chatbot` kind wires two channels (the chatbot channel and the
/// paired widget conversation channel); teardown must detach both sides,
/// so the registry stores the structured pair rather than a flat list.
pub enum ChannelListeners {
    /// Listeners on the subscription's own channel.
    Own(Vec<Box<dyn ListenerHandle>>),
    /// The two-channel chatbot wiring.
    Chatbot {
        /// Listener for `bot-response` on the chatbot channel.
        bot_response: Box<dyn ListenerHandle>,
        /// Listener for `message` on the paired widget conversation channel.
        widget_message: Box<dyn ListenerHandle>,
    },
}

impl ChannelListeners {
    /// Detach every contained listener.
    pub fn unsubscribe_all(&self) {
        match self {
            Self::Own(handles) => {
                for handle in handles {
                    handle.unsubscribe();
                }
            }
            Self::Chatbot {
                bot_response,
                widget_message,
            } => {
                bot_response.unsubscribe();
                widget_message.unsubscribe();
            }
        }
    }

}

impl std::fmt::Debug for ChannelListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Own(handles) => f.debug_tuple("Own").field(&handles.len()).finish(),
            Self::Chatbot { .. } => f.write_str("Chatbot"),
        }
    }
}

/// A live subscription entry: channel handle, attached listeners, and the
/// originating record.
pub struct ActiveChannel {
    /// The live channel handle.
    pub channel: Arc<dyn PubSubChannel>,
    /// Listener handles needed for clean unsubscription.
    pub listeners: ChannelListeners,
    /// The persisted record this entry was established from.
    pub record: SubscriptionRecord,
}

impl std::fmt::Debug for ActiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveChannel")
            .field("channel", &self.channel.name())
            .field("listeners", &self.listeners)
            .field("record_id", &self.record.id)
            .finish()
    }
}

/// Process-local map from subscription key to live channel state.
///
/// Ephemeral: rebuilt from active subscription records on startup. Owned
/// exclusively by the subscription manager; no other component mutates it.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: DashMap<SubscriptionKey, ActiveChannel>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live subscription. Replaces (and returns) any previous
    /// entry under the same key; the caller is responsible for detaching
    /// the returned entry's listeners.
    pub fn insert(&self, key: SubscriptionKey, entry: ActiveChannel) -> Option<ActiveChannel> {
        self.entries.insert(key, entry)
    }

    /// Remove and return the entry for a key, if present.
    pub fn remove(&self, key: &SubscriptionKey) -> Option<ActiveChannel> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Whether a live entry exists for the key.
    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// The record a live entry was established from, if present.
    pub fn record(&self, key: &SubscriptionKey) -> Option<SubscriptionRecord> {
        self.entries.get(key).map(|entry| entry.record.clone())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all registered keys.
    pub fn keys(&self) -> Vec<SubscriptionKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}
