//! In-memory store backing every persistence port.
//!
//! Used by the integration test harness and suitable for single-node
//! demo deployments. State lives in one Tokio mutex; every table is a
//! plain vector in insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use deskhub_core::error::AppError;
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
    SubscriptionRecord, merge_metadata,
};
use deskhub_entity::team::{Team, TeamMember};
use deskhub_entity::ticket::{CreateTicket, Ticket};
use deskhub_entity::user::User;
use deskhub_entity::widget::Widget;

use super::{
    ChatbotProfileStore, ConversationStore, NotificationStore, SessionStore, SubscriptionStore,
    TeamStore, TicketStore, UserStore, WidgetStore,
};

/// All tables of the in-memory store.
#[derive(Debug, Default)]
struct InnerState {
    subscriptions: Vec<SubscriptionRecord>,
    tickets: Vec<Ticket>,
    /// `(team_id, agent_id)` pairs in assignment order.
    assignments: Vec<(Uuid, Uuid)>,
    messages: Vec<ConversationMessage>,
    users: Vec<User>,
    teams: Vec<Team>,
    members: Vec<TeamMember>,
    sessions: Vec<SessionContext>,
    session_fields: HashMap<Uuid, Value>,
    profiles: Vec<ChatbotProfile>,
    widgets: Vec<Widget>,
    notifications: Vec<(Notification, Vec<Uuid>)>,
}

/// In-memory implementation of every store port.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<InnerState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user row.
    pub async fn seed_user(&self, user: User) {
        self.state.lock().await.users.push(user);
    }

    /// Seed a team row.
    pub async fn seed_team(&self, team: Team) {
        self.state.lock().await.teams.push(team);
    }

    /// Seed a team membership row.
    pub async fn seed_member(&self, team_id: Uuid, user_id: Uuid) {
        self.state.lock().await.members.push(TeamMember {
            team_id,
            user_id,
            created_at: Utc::now(),
        });
    }

    /// Seed a session-context projection row.
    pub async fn seed_session(&self, session: SessionContext) {
        self.state.lock().await.sessions.push(session);
    }

    /// Seed a chatbot profile row.
    pub async fn seed_profile(&self, profile: ChatbotProfile) {
        self.state.lock().await.profiles.push(profile);
    }

    /// Seed a widget row.
    pub async fn seed_widget(&self, widget: Widget) {
        self.state.lock().await.widgets.push(widget);
    }

    /// Seed a pre-existing subscription row, as replay tests need.
    pub async fn seed_subscription(&self, record: SubscriptionRecord) {
        self.state.lock().await.subscriptions.push(record);
    }

    /// Snapshot of every subscription row, active or not.
    pub async fn subscription_rows(&self) -> Vec<SubscriptionRecord> {
        self.state.lock().await.subscriptions.clone()
    }

    /// Snapshot of every persisted notification with its recipients.
    pub async fn notifications(&self) -> Vec<(Notification, Vec<Uuid>)> {
        self.state.lock().await.notifications.clone()
    }

    /// The merged data-collection fields stored for a session.
    pub async fn session_fields(&self, id: SessionId) -> Option<Value> {
        self.state
            .lock()
            .await
            .session_fields
            .get(id.as_uuid())
            .cloned()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_latest_by_key(
        &self,
        key: &SubscriptionKey,
    ) -> AppResult<Option<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|r| &r.key() == key)
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn find_active_by_key(
        &self,
        key: &SubscriptionKey,
    ) -> AppResult<Option<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|r| r.is_active && &r.key() == key)
            .cloned())
    }

    async fn insert(&self, subscription: &NewSubscription) -> AppResult<SubscriptionRecord> {
        let mut state = self.state.lock().await;
        // Mirrors the partial unique index on active rows.
        let key = subscription.key();
        if state
            .subscriptions
            .iter()
            .any(|r| r.is_active && r.key() == key)
        {
            return Err(AppError::conflict(format!(
                "active subscription already exists for {key}"
            )));
        }
        let now = Utc::now();
        let record = SubscriptionRecord {
            id: Uuid::new_v4(),
            channel_name: subscription.channel_name.clone(),
            channel_kind: subscription.channel_kind,
            subscriber_id: subscription.subscriber_id,
            subscriber_kind: subscription.subscriber_kind,
            ticket_id: subscription.ticket_id,
            session_id: subscription.session_id,
            workspace_id: subscription.workspace_id,
            client_id: subscription.client_id,
            chatbot_profile_id: subscription.chatbot_profile_id,
            is_active: true,
            metadata: subscription
                .metadata
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
            last_activity: now,
            created_at: now,
            updated_at: now,
        };
        state.subscriptions.push(record.clone());
        Ok(record)
    }

    async fn reactivate(
        &self,
        id: SubscriptionId,
        patch: &SubscriptionPatch,
    ) -> AppResult<SubscriptionRecord> {
        let mut state = self.state.lock().await;
        let row = state
            .subscriptions
            .iter_mut()
            .find(|r| r.id == id.into_uuid())
            .ok_or_else(|| AppError::not_found(format!("subscription {id} not found")))?;
        row.is_active = true;
        if let Some(metadata) = &patch.metadata {
            row.metadata = metadata.clone();
        }
        if patch.ticket_id.is_some() {
            row.ticket_id = patch.ticket_id;
        }
        if patch.session_id.is_some() {
            row.session_id = patch.session_id;
        }
        if patch.workspace_id.is_some() {
            row.workspace_id = patch.workspace_id;
        }
        if patch.client_id.is_some() {
            row.client_id = patch.client_id;
        }
        if patch.chatbot_profile_id.is_some() {
            row.chatbot_profile_id = patch.chatbot_profile_id;
        }
        let now = Utc::now();
        row.last_activity = now;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn deactivate(&self, id: SubscriptionId) -> AppResult<Option<SubscriptionRecord>> {
        let mut state = self.state.lock().await;
        let Some(row) = state
            .subscriptions
            .iter_mut()
            .find(|r| r.id == id.into_uuid())
        else {
            return Ok(None);
        };
        row.is_active = false;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn deactivate_for_subscriber(
        &self,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
        exclude_ticket: Option<TicketId>,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        let mut state = self.state.lock().await;
        let excluded = exclude_ticket.map(TicketId::into_uuid);
        let now = Utc::now();
        let mut updated = Vec::new();
        for row in state.subscriptions.iter_mut() {
            if row.is_active
                && row.subscriber_id == subscriber_id
                && row.subscriber_kind == subscriber_kind
                && (excluded.is_none() || row.ticket_id != excluded)
            {
                row.is_active = false;
                row.updated_at = now;
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn list_active(&self) -> AppResult<Vec<SubscriptionRecord>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .subscriptions
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn list_active_by_channel(
        &self,
        channel_name: &str,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|r| r.is_active && r.channel_name == channel_name)
            .cloned()
            .collect())
    }

    async fn list_active_by_subscriber(
        &self,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|r| {
                r.is_active
                    && r.subscriber_id == subscriber_id
                    && r.subscriber_kind == subscriber_kind
            })
            .cloned()
            .collect())
    }

    async fn list_active_by_ticket(
        &self,
        ticket_id: TicketId,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|r| r.is_active && r.ticket_id == Some(ticket_id.into_uuid()))
            .cloned()
            .collect())
    }

    async fn list_stale_inactive(
        &self,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|r| !r.is_active && r.last_activity < older_than)
            .cloned()
            .collect())
    }

    async fn touch_activity(&self, id: SubscriptionId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(row) = state
            .subscriptions
            .iter_mut()
            .find(|r| r.id == id.into_uuid())
        {
            row.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn count_active_by_kind(&self) -> AppResult<Vec<(ChannelKind, i64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<ChannelKind, i64> = HashMap::new();
        for row in state.subscriptions.iter().filter(|r| r.is_active) {
            *counts.entry(row.channel_kind).or_default() += 1;
        }
        let mut out: Vec<_> = counts.into_iter().collect();
        out.sort_by_key(|(kind, _)| kind.as_str());
        Ok(out)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert(&self, ticket: &CreateTicket) -> AppResult<Ticket> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let row = Ticket {
            id: Uuid::new_v4(),
            subject: ticket.subject.clone(),
            status: ticket.status,
            client_id: ticket.client_id,
            workspace_id: ticket.workspace_id,
            team_id: ticket.team_id,
            session_id: ticket.session_id,
            assigned_to: None,
            ai_enabled: ticket.ai_enabled,
            csat_rating: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        };
        state.tickets.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: TicketId) -> AppResult<Option<Ticket>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .find(|t| t.id == id.into_uuid())
            .cloned())
    }

    async fn set_assignee(&self, id: TicketId, agent_id: UserId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let Some(ticket) = state.tickets.iter_mut().find(|t| t.id == id.into_uuid()) else {
            return Err(AppError::not_found(format!("ticket {id} not found")));
        };
        ticket.assigned_to = Some(agent_id.into_uuid());
        ticket.updated_at = Utc::now();
        let team_id = ticket.team_id;
        if let Some(team_id) = team_id {
            state.assignments.push((team_id, agent_id.into_uuid()));
        }
        Ok(())
    }

    async fn set_csat(&self, id: TicketId, rating: i16) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let Some(ticket) = state.tickets.iter_mut().find(|t| t.id == id.into_uuid()) else {
            return Err(AppError::not_found(format!("ticket {id} not found")));
        };
        ticket.csat_rating = Some(rating);
        ticket.updated_at = Utc::now();
        Ok(())
    }

    async fn count_open_by_assignee(&self, team_id: TeamId) -> AppResult<Vec<(UserId, i64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for ticket in state.tickets.iter() {
            if ticket.team_id == Some(team_id.into_uuid()) && ticket.status.is_open() {
                if let Some(agent) = ticket.assigned_to {
                    *counts.entry(agent).or_default() += 1;
                }
            }
        }
        let mut out: Vec<_> = counts
            .into_iter()
            .map(|(id, n)| (UserId::from_uuid(id), n))
            .collect();
        out.sort_by_key(|(id, _)| *id.as_uuid());
        Ok(out)
    }

    async fn last_assigned_agent(&self, team_id: TeamId) -> AppResult<Option<UserId>> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .rev()
            .find(|(team, _)| *team == team_id.into_uuid())
            .map(|(_, agent)| UserId::from_uuid(*agent)))
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn insert(&self, message: &NewConversationMessage) -> AppResult<ConversationMessage> {
        let mut state = self.state.lock().await;
        let row = ConversationMessage {
            id: Uuid::new_v4(),
            ticket_id: message.ticket_id,
            sender_kind: message.sender_kind,
            sender_id: message.sender_id,
            session_id: message.session_id,
            body: message.body.clone(),
            message_kind: message.message_kind,
            attachment_type: message.attachment_type.clone(),
            attachment_url: message.attachment_url.clone(),
            created_at: Utc::now(),
        };
        state.messages.push(row.clone());
        Ok(row)
    }

    async fn list_by_ticket(&self, ticket_id: TicketId) -> AppResult<Vec<ConversationMessage>> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id.into_uuid())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.id == id.into_uuid() && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_bot_agent(&self, client_id: ClientId) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.client_id == client_id.into_uuid() && u.is_bot && u.deleted_at.is_none())
            .cloned())
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn find_channel_team(
        &self,
        workspace_id: WorkspaceId,
        channel: &str,
    ) -> AppResult<Option<Team>> {
        let state = self.state.lock().await;
        Ok(state
            .teams
            .iter()
            .find(|t| {
                t.workspace_id == workspace_id.into_uuid()
                    && t.channel == channel
                    && t.deleted_at.is_none()
            })
            .cloned())
    }

    async fn list_members(&self, team_id: TeamId) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let member_ids: Vec<Uuid> = state
            .members
            .iter()
            .filter(|m| m.team_id == team_id.into_uuid())
            .map(|m| m.user_id)
            .collect();
        Ok(state
            .users
            .iter()
            .filter(|u| member_ids.contains(&u.id) && u.deleted_at.is_none())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_context(&self, id: SessionId) -> AppResult<Option<SessionContext>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .find(|s| s.session_id == id.into_uuid())
            .cloned())
    }

    async fn merge_fields(&self, id: SessionId, fields: &Value) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.sessions.iter().any(|s| s.session_id == id.into_uuid()) {
            return Err(AppError::not_found(format!("session {id} not found")));
        }
        let merged = match state.session_fields.get(id.as_uuid()) {
            Some(existing) => merge_metadata(existing, fields),
            None => merge_metadata(&Value::Null, fields),
        };
        state.session_fields.insert(id.into_uuid(), merged);
        Ok(())
    }
}

#[async_trait]
impl ChatbotProfileStore for MemoryStore {
    async fn find_by_id(&self, id: ChatbotProfileId) -> AppResult<Option<ChatbotProfile>> {
        let state = self.state.lock().await;
        Ok(state
            .profiles
            .iter()
            .find(|p| p.id == id.into_uuid() && p.deleted_at.is_none())
            .cloned())
    }
}

#[async_trait]
impl WidgetStore for MemoryStore {
    async fn find_by_id(&self, id: WidgetId) -> AppResult<Option<Widget>> {
        let state = self.state.lock().await;
        Ok(state
            .widgets
            .iter()
            .find(|w| w.id == id.into_uuid() && w.deleted_at.is_none())
            .cloned())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_with_recipients(
        &self,
        notification: &NewNotification,
        recipients: &[UserId],
    ) -> AppResult<Notification> {
        let mut state = self.state.lock().await;
        let row = Notification {
            id: Uuid::new_v4(),
            kind: notification.kind.clone(),
            entity_id: notification.entity_id,
            actor_id: notification.actor_id,
            payload: notification.payload.clone(),
            created_at: Utc::now(),
        };
        let recipient_ids: Vec<Uuid> = recipients.iter().map(|r| r.into_uuid()).collect();
        state.notifications.push((row.clone(), recipient_ids));
        Ok(row)
    }
}
