//! Widget contact session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A widget contact session: the identity of one customer talking through
/// an embedded chat widget.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactSession {
    /// Unique session identifier.
    pub id: Uuid,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Owning workspace.
    pub workspace_id: Uuid,
    /// The widget the session originated from.
    pub widget_id: Option<Uuid>,
    /// Customer name, when collected.
    pub contact_name: Option<String>,
    /// Customer email, when collected.
    pub contact_email: Option<String>,
    /// Collected data-collection form fields (JSON object).
    pub fields: Option<serde_json::Value>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last updated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A session joined with the client routing flags the ticket intake needs.
///
/// Flat projection of `contact_sessions INNER JOIN clients`, fetched in a
/// single query at intake time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionContext {
    /// The session identifier.
    pub session_id: Uuid,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Owning workspace.
    pub workspace_id: Uuid,
    /// The widget the session originated from.
    pub widget_id: Option<Uuid>,
    /// Customer name, when collected.
    pub contact_name: Option<String>,
    /// Customer email, when collected.
    pub contact_email: Option<String>,
    /// Whether the owning client has chatbot handling enabled.
    pub client_ai_enabled: bool,
}
