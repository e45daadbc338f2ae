//! Notification persistence and realtime fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use deskhub_core::result::AppResult;
use deskhub_core::types::id::UserId;
use deskhub_entity::notification::{NewNotification, Notification};

use crate::channel::ChannelName;
use crate::message::NotificationEvent;
use crate::store::NotificationStore;
use crate::transport::PubSubTransport;

/// Name of the event pushed onto personal user channels.
pub const NOTIFICATION_EVENT: &str = "notification";

/// A notification to persist and push.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    /// Event kind, e.g. `"new_ticket"`.
    pub kind: String,
    /// The entity the notification is about.
    pub entity_id: Option<Uuid>,
    /// The user who triggered the event, if any.
    pub actor_id: Option<Uuid>,
    /// Users to persist a delivery row for and push to.
    pub recipient_ids: Vec<UserId>,
    /// Structured payload relayed to clients.
    pub payload: Value,
    /// Extra channels the event is also published on.
    pub broadcast_channels: Vec<String>,
}

impl NotificationRequest {
    /// Build a request addressed to one or more recipients.
    pub fn new(kind: impl Into<String>, recipient_ids: Vec<UserId>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            entity_id: None,
            actor_id: None,
            recipient_ids,
            payload,
            broadcast_channels: Vec::new(),
        }
    }

    /// Attach the entity the notification is about.
    pub fn about(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    /// Also publish the event on an extra channel.
    pub fn broadcast_on(mut self, channel: impl Into<String>) -> Self {
        self.broadcast_channels.push(channel.into());
        self
    }
}

/// Sink for notifications produced by routing flows.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Persist the notification, push it to every recipient's personal
    /// channel, and publish it on any extra broadcast channels.
    async fn create_and_broadcast(&self, request: NotificationRequest) -> AppResult<()>;
}

/// Persists one notification row (with per-recipient delivery rows),
/// then pushes a `notification` event onto each recipient's personal
/// channel and every requested broadcast channel.
///
/// Push failures are logged per target and do not fail the request; the
/// persisted row is the durable copy an offline recipient reads later.
pub struct NotificationFanout {
    store: Arc<dyn NotificationStore>,
    transport: Arc<dyn PubSubTransport>,
}

impl NotificationFanout {
    /// Create a fan-out over the given store and transport.
    pub fn new(store: Arc<dyn NotificationStore>, transport: Arc<dyn PubSubTransport>) -> Self {
        Self { store, transport }
    }

    fn event_payload(notification: &Notification) -> AppResult<Value> {
        let event = NotificationEvent {
            id: notification.id,
            kind: notification.kind.clone(),
            entity_id: notification.entity_id,
            payload: notification.payload.clone(),
        };
        Ok(serde_json::to_value(event)?)
    }

    async fn publish_to(&self, channel_name: &str, kind: &str, payload: Value) {
        let channel = self.transport.channel(channel_name);
        if let Err(error) = channel.publish(NOTIFICATION_EVENT, payload).await {
            warn!(channel = channel_name, kind, %error, "failed to push notification");
        }
    }
}

#[async_trait]
impl Notifier for NotificationFanout {
    async fn create_and_broadcast(&self, request: NotificationRequest) -> AppResult<()> {
        if request.recipient_ids.is_empty() && request.broadcast_channels.is_empty() {
            debug!(kind = %request.kind, "notification has no targets, skipping");
            return Ok(());
        }

        let record = NewNotification {
            kind: request.kind.clone(),
            entity_id: request.entity_id,
            actor_id: request.actor_id,
            payload: request.payload.clone(),
        };
        let stored = self
            .store
            .create_with_recipients(&record, &request.recipient_ids)
            .await?;

        let payload = Self::event_payload(&stored)?;
        for recipient in &request.recipient_ids {
            let name = ChannelName::User(*recipient).to_string();
            self.publish_to(&name, &request.kind, payload.clone()).await;
        }
        for channel in &request.broadcast_channels {
            self.publish_to(channel, &request.kind, payload.clone()).await;
        }

        debug!(
            kind = %request.kind,
            recipients = request.recipient_ids.len(),
            notification_id = %stored.id,
            "notification fanned out"
        );
        Ok(())
    }
}
