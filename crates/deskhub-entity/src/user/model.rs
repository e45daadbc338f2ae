//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A support user: either a human agent or a bot agent.
///
/// Bot agents are ordinary user rows flagged with `is_bot`; they are
/// excluded from team routing and used as the sender identity for
/// chatbot and QA-pipeline conversation rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Human-readable display name.
    pub display_name: String,
    /// Email address (optional for bot agents).
    pub email: Option<String>,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Whether this user is a bot agent.
    pub is_bot: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp; deleted users are filtered from reads.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether the user can be assigned tickets by a routing strategy.
    pub fn is_routable_agent(&self) -> bool {
        !self.is_bot && self.deleted_at.is_none()
    }
}
