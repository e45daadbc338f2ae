//! In-memory pub/sub transport for single-node deployments and tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use deskhub_core::result::AppResult;

use super::{ChannelEvent, EventHandler, ListenerHandle, PubSubChannel, PubSubTransport};

/// In-memory pub/sub transport.
///
/// Channels are created lazily on first access and live for the process
/// lifetime. Each delivery runs in its own task so that one stuck
/// listener never blocks siblings or the publisher.
#[derive(Default)]
pub struct MemoryTransport {
    channels: DashMap<String, Arc<MemoryChannel>>,
}

impl MemoryTransport {
    /// Create a new in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels created so far.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl PubSubTransport for MemoryTransport {
    fn channel(&self, name: &str) -> Arc<dyn PubSubChannel> {
        let channel = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryChannel::new(name)))
            .value()
            .clone();
        channel
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("channels", &self.channels.len())
            .finish()
    }
}

/// A registered listener on a memory channel.
struct ListenerEntry {
    /// Event name filter; `None` receives every event.
    event: Option<String>,
    handler: EventHandler,
}

/// One in-memory channel with its listener table.
pub struct MemoryChannel {
    name: String,
    next_listener_id: AtomicU64,
    listeners: Arc<DashMap<u64, ListenerEntry>>,
}

impl MemoryChannel {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_listener_id: AtomicU64::new(1),
            listeners: Arc::new(DashMap::new()),
        }
    }

    fn attach(&self, event: Option<String>, handler: EventHandler) -> Box<dyn ListenerHandle> {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, ListenerEntry { event, handler });
        Box::new(MemoryListenerHandle {
            id,
            listeners: Arc::clone(&self.listeners),
        })
    }
}

#[async_trait]
impl PubSubChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(
        &self,
        event: &str,
        handler: EventHandler,
    ) -> AppResult<Box<dyn ListenerHandle>> {
        Ok(self.attach(Some(event.to_string()), handler))
    }

    async fn subscribe_all(&self, handler: EventHandler) -> AppResult<Box<dyn ListenerHandle>> {
        Ok(self.attach(None, handler))
    }

    async fn publish(&self, event: &str, payload: serde_json::Value) -> AppResult<()> {
        // Snapshot matching handlers before invoking so no map guard is
        // held while listeners run (listeners may publish back onto this
        // same channel).
        let matching: Vec<EventHandler> = self
            .listeners
            .iter()
            .filter(|entry| match &entry.value().event {
                Some(name) => name == event,
                None => true,
            })
            .map(|entry| entry.value().handler.clone())
            .collect();

        trace!(
            channel = %self.name,
            event = %event,
            listeners = matching.len(),
            "Publishing event"
        );

        for handler in matching {
            let delivered = ChannelEvent {
                channel: self.name.clone(),
                event: event.to_string(),
                payload: payload.clone(),
            };
            tokio::spawn(handler(delivered));
        }

        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Listener handle for a memory channel.
struct MemoryListenerHandle {
    id: u64,
    listeners: Arc<DashMap<u64, ListenerEntry>>,
}

impl ListenerHandle for MemoryListenerHandle {
    fn unsubscribe(&self) {
        self.listeners.remove(&self.id);
    }
}
