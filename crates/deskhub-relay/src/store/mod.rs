//! Persistence ports used by the relay.
//!
//! The relay is written against these traits; the database crate
//! implements them over Postgres and tests implement them in memory.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use deskhub_core::result::AppResult;
use deskhub_core::types::id::{
    ChatbotProfileId, ClientId, SessionId, SubscriptionId, TeamId, TicketId, UserId, WidgetId,
    WorkspaceId,
};
use deskhub_entity::chatbot::ChatbotProfile;
use deskhub_entity::conversation::{ConversationMessage, NewConversationMessage};
use deskhub_entity::notification::{NewNotification, Notification};
use deskhub_entity::session::SessionContext;
use deskhub_entity::subscription::{
    ChannelKind, NewSubscription, SubscriberKind, SubscriptionKey, SubscriptionPatch,
    SubscriptionRecord,
};
use deskhub_entity::team::Team;
use deskhub_entity::ticket::{CreateTicket, Ticket};
use deskhub_entity::user::User;
use deskhub_entity::widget::Widget;

/// Persistent channel-subscription registry.
#[async_trait]
pub trait SubscriptionStore: Send + Sync + 'static {
    /// Most recent row for a logical key, active or not.
    async fn find_latest_by_key(
        &self,
        key: &SubscriptionKey,
    ) -> AppResult<Option<SubscriptionRecord>>;

    /// The active row for a logical key, if any.
    async fn find_active_by_key(
        &self,
        key: &SubscriptionKey,
    ) -> AppResult<Option<SubscriptionRecord>>;

    /// Insert a fresh active row.
    async fn insert(&self, subscription: &NewSubscription) -> AppResult<SubscriptionRecord>;

    /// Flip an inactive row back to active, applying the patch.
    async fn reactivate(
        &self,
        id: SubscriptionId,
        patch: &SubscriptionPatch,
    ) -> AppResult<SubscriptionRecord>;

    /// Mark one row inactive. Returns the updated row, if found.
    async fn deactivate(&self, id: SubscriptionId) -> AppResult<Option<SubscriptionRecord>>;

    /// Mark every active row of one subscriber inactive, optionally
    /// keeping rows tied to one ticket. Returns the rows deactivated.
    async fn deactivate_for_subscriber(
        &self,
        subscriber_id: uuid::Uuid,
        subscriber_kind: SubscriberKind,
        exclude_ticket: Option<TicketId>,
    ) -> AppResult<Vec<SubscriptionRecord>>;

    /// All active rows, oldest first.
    async fn list_active(&self) -> AppResult<Vec<SubscriptionRecord>>;

    /// Active rows for one channel name.
    async fn list_active_by_channel(&self, channel_name: &str)
        -> AppResult<Vec<SubscriptionRecord>>;

    /// Active rows for one subscriber.
    async fn list_active_by_subscriber(
        &self,
        subscriber_id: uuid::Uuid,
        subscriber_kind: SubscriberKind,
    ) -> AppResult<Vec<SubscriptionRecord>>;

    /// Active rows referencing one ticket.
    async fn list_active_by_ticket(&self, ticket_id: TicketId)
        -> AppResult<Vec<SubscriptionRecord>>;

    /// Inactive rows whose last activity is older than the cutoff.
    async fn list_stale_inactive(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Vec<SubscriptionRecord>>;

    /// Bump a row's last-activity timestamp.
    async fn touch_activity(&self, id: SubscriptionId) -> AppResult<()>;

    /// Active-row counts grouped by channel kind.
    async fn count_active_by_kind(&self) -> AppResult<Vec<(ChannelKind, i64)>>;
}

/// Ticket persistence.
#[async_trait]
pub trait TicketStore: Send + Sync + 'static {
    /// Create a ticket and return the stored row.
    async fn insert(&self, ticket: &CreateTicket) -> AppResult<Ticket>;

    /// Fetch one ticket.
    async fn find_by_id(&self, id: TicketId) -> AppResult<Option<Ticket>>;

    /// Record an assignment.
    async fn set_assignee(&self, id: TicketId, agent_id: UserId) -> AppResult<()>;

    /// Record a CSAT rating.
    async fn set_csat(&self, id: TicketId, rating: i16) -> AppResult<()>;

    /// Open-ticket counts per assignee within one team.
    async fn count_open_by_assignee(&self, team_id: TeamId) -> AppResult<Vec<(UserId, i64)>>;

    /// The most recently assigned agent in one team, if any.
    async fn last_assigned_agent(&self, team_id: TeamId) -> AppResult<Option<UserId>>;
}

/// Conversation message persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    /// Append a message and return the stored row.
    async fn insert(&self, message: &NewConversationMessage) -> AppResult<ConversationMessage>;

    /// All messages of one ticket, oldest first.
    async fn list_by_ticket(&self, ticket_id: TicketId) -> AppResult<Vec<ConversationMessage>>;
}

/// User lookups.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Fetch one user.
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    /// The bot identity of a client, used as the sender of automated
    /// messages.
    async fn find_bot_agent(&self, client_id: ClientId) -> AppResult<Option<User>>;
}

/// Team lookups used by routing.
#[async_trait]
pub trait TeamStore: Send + Sync + 'static {
    /// The team serving one intake channel within a workspace.
    async fn find_channel_team(
        &self,
        workspace_id: WorkspaceId,
        channel: &str,
    ) -> AppResult<Option<Team>>;

    /// Current members of a team.
    async fn list_members(&self, team_id: TeamId) -> AppResult<Vec<User>>;
}

/// Widget contact-session lookups.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Session joined with its client context, if the session exists.
    async fn find_context(&self, id: SessionId) -> AppResult<Option<SessionContext>>;

    /// Shallow-merge submitted fields into the session's stored fields.
    async fn merge_fields(&self, id: SessionId, fields: &Value) -> AppResult<()>;
}

/// Chatbot profile lookups.
#[async_trait]
pub trait ChatbotProfileStore: Send + Sync + 'static {
    /// Fetch one profile.
    async fn find_by_id(&self, id: ChatbotProfileId) -> AppResult<Option<ChatbotProfile>>;
}

/// Widget lookups.
#[async_trait]
pub trait WidgetStore: Send + Sync + 'static {
    /// Fetch one widget.
    async fn find_by_id(&self, id: WidgetId) -> AppResult<Option<Widget>>;
}

/// Notification persistence.
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Persist a notification and its recipient rows.
    async fn create_with_recipients(
        &self,
        notification: &NewNotification,
        recipients: &[UserId],
    ) -> AppResult<Notification>;
}
