//! Newtype wrappers around [`uuid::Uuid`] for all domain entity identifiers.
//!
//! Using distinct types prevents accidentally passing a `SessionId` where a
//! `TicketId` is expected. Database rows store plain `Uuid` columns; the
//! typed wrappers are used at service and routing boundaries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around `Uuid`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Return the inner UUID value.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }

            /// Return a reference to the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a support ticket.
    TicketId
);

define_id!(
    /// Unique identifier for a widget contact session.
    SessionId
);

define_id!(
    /// Unique identifier for a workspace (tenant sub-division).
    WorkspaceId
);

define_id!(
    /// Unique identifier for a client (tenant organization).
    ClientId
);

define_id!(
    /// Unique identifier for a support team.
    TeamId
);

define_id!(
    /// Unique identifier for a user (agent or bot agent).
    UserId
);

define_id!(
    /// Unique identifier for a conversation message row.
    ConversationId
);

define_id!(
    /// Unique identifier for a channel subscription record.
    SubscriptionId
);

define_id!(
    /// Unique identifier for a chatbot profile.
    ChatbotProfileId
);

define_id!(
    /// Unique identifier for a chat widget.
    WidgetId
);

define_id!(
    /// Unique identifier for a notification.
    NotificationId
);
