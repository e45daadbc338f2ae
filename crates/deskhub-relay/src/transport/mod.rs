//! Pub/sub transport abstraction.
//!
//! The relay talks to its channel provider through these traits only.
//! Delivery is assumed at-least-once; listeners must tolerate duplicate
//! delivery. Publish failures are logged by callers and never retried by
//! the relay itself.

pub mod memory;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use deskhub_core::result::AppResult;

pub use memory::MemoryTransport;

/// One delivered pub/sub event.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    /// The channel the event arrived on.
    pub channel: String,
    /// The event name.
    pub event: String,
    /// The raw payload. May be a JSON string that itself encodes an
    /// object; listeners normalize before reading fields.
    pub payload: serde_json::Value,
}

/// Callback invoked for each delivered event.
pub type EventHandler = Arc<dyn Fn(ChannelEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure into an [`EventHandler`].
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(ChannelEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Handle returned by a subscribe call; used to detach the listener.
pub trait ListenerHandle: Send + Sync {
    /// Detach the listener. Idempotent.
    fn unsubscribe(&self);
}

/// A live handle to one named channel.
#[async_trait]
pub trait PubSubChannel: Send + Sync {
    /// The channel name.
    fn name(&self) -> &str;

    /// Attach a listener for one event name.
    async fn subscribe(
        &self,
        event: &str,
        handler: EventHandler,
    ) -> AppResult<Box<dyn ListenerHandle>>;

    /// Attach a listener receiving every event on the channel.
    async fn subscribe_all(&self, handler: EventHandler) -> AppResult<Box<dyn ListenerHandle>>;

    /// Publish an event to the channel.
    async fn publish(&self, event: &str, payload: serde_json::Value) -> AppResult<()>;
}

/// The channel provider: hands out live channel handles by name.
pub trait PubSubTransport: Send + Sync {
    /// Obtain (creating if needed) the channel with the given name.
    fn channel(&self, name: &str) -> Arc<dyn PubSubChannel>;
}
