//! Subscription record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::key::SubscriptionKey;
use super::kind::ChannelKind;
use super::subscriber::SubscriberKind;

/// A persisted channel subscription: one row per `(channel, subscriber)`
/// pairing the system has ever wired up.
///
/// Rows are never hard-deleted. Removal deactivates the row so that the
/// subscription history survives restarts and audits; reactivation updates
/// the same row in place rather than inserting a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRecord {
    /// Unique subscription identifier.
    pub id: Uuid,
    /// The pub/sub topic name.
    pub channel_name: String,
    /// The channel's purpose; selects the listener set to attach.
    pub channel_kind: ChannelKind,
    /// The owning subscriber's identifier.
    pub subscriber_id: Uuid,
    /// The owning subscriber's kind.
    pub subscriber_kind: SubscriberKind,
    /// Associated ticket, when the channel is ticket-scoped.
    pub ticket_id: Option<Uuid>,
    /// Associated widget contact session.
    pub session_id: Option<Uuid>,
    /// Associated workspace.
    pub workspace_id: Option<Uuid>,
    /// Associated client (tenant).
    pub client_id: Option<Uuid>,
    /// Associated chatbot profile, for `chatbot` channels.
    pub chatbot_profile_id: Option<Uuid>,
    /// Soft lifecycle flag; inactive rows are kept for history.
    pub is_active: bool,
    /// Free-form annotation bag (JSON object).
    pub metadata: serde_json::Value,
    /// Last time traffic or a touch was observed for this subscription.
    pub last_activity: DateTime<Utc>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Return the composite key identifying this subscription.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(
            self.channel_name.clone(),
            self.subscriber_id,
            self.subscriber_kind,
        )
    }

    /// Whether the stored routing context differs from an incoming spec.
    ///
    /// Used on reactivation to decide whether live listeners must be
    /// rewired: listener closures capture the ticket context, so a record
    /// reused for a different ticket must not keep the old listeners.
    pub fn context_differs(&self, spec: &NewSubscription) -> bool {
        (spec.ticket_id.is_some() && spec.ticket_id != self.ticket_id)
            || (spec.session_id.is_some() && spec.session_id != self.session_id)
            || (spec.chatbot_profile_id.is_some()
                && spec.chatbot_profile_id != self.chatbot_profile_id)
    }
}

/// Specification for requesting a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    /// The pub/sub topic name.
    pub channel_name: String,
    /// The channel's purpose.
    pub channel_kind: ChannelKind,
    /// The owning subscriber's identifier.
    pub subscriber_id: Uuid,
    /// The owning subscriber's kind.
    pub subscriber_kind: SubscriberKind,
    /// Associated ticket.
    pub ticket_id: Option<Uuid>,
    /// Associated widget contact session.
    pub session_id: Option<Uuid>,
    /// Associated workspace.
    pub workspace_id: Option<Uuid>,
    /// Associated client (tenant).
    pub client_id: Option<Uuid>,
    /// Associated chatbot profile.
    pub chatbot_profile_id: Option<Uuid>,
    /// Initial annotation bag; merged into existing metadata on
    /// reactivation with new keys winning.
    pub metadata: Option<serde_json::Value>,
}

impl NewSubscription {
    /// Create a minimal subscription spec with no routing context.
    pub fn new(
        channel_name: impl Into<String>,
        channel_kind: ChannelKind,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            channel_kind,
            subscriber_id,
            subscriber_kind,
            ticket_id: None,
            session_id: None,
            workspace_id: None,
            client_id: None,
            chatbot_profile_id: None,
            metadata: None,
        }
    }

    /// Attach a ticket context.
    pub fn with_ticket(mut self, ticket_id: Uuid) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    /// Attach a session context.
    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Attach a workspace context.
    pub fn with_workspace(mut self, workspace_id: Uuid) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Attach a client context.
    pub fn with_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Attach a chatbot profile context.
    pub fn with_chatbot_profile(mut self, profile_id: Uuid) -> Self {
        self.chatbot_profile_id = Some(profile_id);
        self
    }

    /// Attach initial metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Return the composite key this spec resolves to.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(
            self.channel_name.clone(),
            self.subscriber_id,
            self.subscriber_kind,
        )
    }
}

/// Field updates applied when an existing record is reactivated.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    /// Replacement metadata (already merged by the caller).
    pub metadata: Option<serde_json::Value>,
    /// Updated ticket context.
    pub ticket_id: Option<Uuid>,
    /// Updated session context.
    pub session_id: Option<Uuid>,
    /// Updated workspace context.
    pub workspace_id: Option<Uuid>,
    /// Updated client context.
    pub client_id: Option<Uuid>,
    /// Updated chatbot profile context.
    pub chatbot_profile_id: Option<Uuid>,
}

impl SubscriptionPatch {
    /// Build a patch from an incoming subscription against the stored
    /// record: merged metadata plus any context ids the newcomer carries.
    pub fn from_spec(existing: &SubscriptionRecord, spec: &NewSubscription) -> Self {
        Self {
            metadata: spec
                .metadata
                .as_ref()
                .map(|incoming| merge_metadata(&existing.metadata, incoming)),
            ticket_id: spec.ticket_id,
            session_id: spec.session_id,
            workspace_id: spec.workspace_id,
            client_id: spec.client_id,
            chatbot_profile_id: spec.chatbot_profile_id,
        }
    }
}

/// Shallow-merge two metadata objects, with keys from `incoming` winning.
///
/// Non-object values on either side are treated as empty objects, so a
/// malformed stored bag can never poison a reactivation.
pub fn merge_metadata(base: &serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    let mut merged = match base {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let serde_json::Value::Object(map) = incoming {
        for (k, v) in map {
            merged.insert(k.clone(), v.clone());
        }
    }
    serde_json::Value::Object(merged)
}
