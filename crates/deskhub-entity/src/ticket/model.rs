//! Ticket entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::TicketStatus;

/// A support ticket.
///
/// Carries the routing context the conversation relay needs (customer
/// session, assignee, AI flag, tenant ids) so that routing decisions do
/// not require joins at message time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    /// Unique ticket identifier.
    pub id: Uuid,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Lifecycle status.
    pub status: TicketStatus,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Owning workspace.
    pub workspace_id: Uuid,
    /// The team the ticket was routed to, if any.
    pub team_id: Option<Uuid>,
    /// The originating widget contact session.
    pub session_id: Option<Uuid>,
    /// The currently assigned agent, if any.
    pub assigned_to: Option<Uuid>,
    /// Whether the owning client has chatbot handling enabled.
    pub ai_enabled: bool,
    /// CSAT rating submitted by the customer (1..=5), if any.
    pub csat_rating: Option<i16>,
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
    /// When the ticket was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the ticket was closed.
    pub closed_at: Option<DateTime<Utc>>,
}

/// Data required to create a new ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicket {
    /// Optional subject line.
    pub subject: Option<String>,
    /// Initial status.
    pub status: TicketStatus,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Owning workspace.
    pub workspace_id: Uuid,
    /// The team the ticket is routed to, if any.
    pub team_id: Option<Uuid>,
    /// The originating widget contact session.
    pub session_id: Option<Uuid>,
    /// Whether chatbot handling is enabled for this ticket.
    pub ai_enabled: bool,
}
