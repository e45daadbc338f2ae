//! Notification entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted notification shared by all of its recipients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// Event kind, e.g. `"new_ticket"` or `"new_message"`.
    pub kind: String,
    /// The entity the notification is about (usually a ticket).
    pub entity_id: Option<Uuid>,
    /// The user who triggered the event, if any.
    pub actor_id: Option<Uuid>,
    /// Structured payload relayed to clients.
    pub payload: serde_json::Value,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

/// Per-recipient delivery row for a notification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRecipient {
    /// The notification.
    pub notification_id: Uuid,
    /// The recipient user.
    pub user_id: Uuid,
    /// Whether the recipient has read the notification.
    pub is_read: bool,
    /// When the recipient read the notification.
    pub read_at: Option<DateTime<Utc>>,
    /// When the delivery row was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to create a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    /// Event kind.
    pub kind: String,
    /// The entity the notification is about.
    pub entity_id: Option<Uuid>,
    /// The user who triggered the event.
    pub actor_id: Option<Uuid>,
    /// Structured payload relayed to clients.
    pub payload: serde_json::Value,
}
