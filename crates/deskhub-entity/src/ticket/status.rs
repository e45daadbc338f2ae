//! Ticket status enumeration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of a support ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Newly created, awaiting a first agent response.
    Open,
    /// Waiting on the customer.
    Pending,
    /// Marked resolved, awaiting confirmation or auto-close.
    Resolved,
    /// Closed; no further routing happens.
    Closed,
}

impl TicketStatus {
    /// Whether messages for this ticket still count toward agent load.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::Pending)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = deskhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(deskhub_core::AppError::validation(format!(
                "Invalid ticket status: '{s}'. Expected one of: open, pending, resolved, closed"
            ))),
        }
    }
}
