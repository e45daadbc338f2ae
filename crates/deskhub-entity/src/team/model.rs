//! Team entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::routing::RoutingStrategy;

/// A support team within a workspace.
///
/// Each team is mapped to an intake channel (e.g. `"chat"` for the
/// widget); new tickets from that channel are routed to the team using
/// its configured routing strategy.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Team {
    /// Unique team identifier.
    pub id: Uuid,
    /// Owning workspace.
    pub workspace_id: Uuid,
    /// Team display name.
    pub name: String,
    /// The intake channel this team handles.
    pub channel: String,
    /// Automatic assignment policy.
    pub routing_strategy: RoutingStrategy,
    /// When the team was created.
    pub created_at: DateTime<Utc>,
    /// When the team was last updated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp; deleted teams are filtered from reads.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Membership of a user in a team.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    /// The team.
    pub team_id: Uuid,
    /// The member user.
    pub user_id: Uuid,
    /// When the membership was created.
    pub created_at: DateTime<Utc>,
}
