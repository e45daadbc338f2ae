//! Ticket intake and routing decision.
//!
//! Runs when a brand-new customer message arrives on a widget session
//! channel: creates the ticket, picks an assignee, seeds the first
//! conversation rows, and kicks off either the QA pipeline or the agent
//! notification fan-out. Failures before and during assignment abort
//! and propagate; everything after the ticket exists is best-effort and
//! logged.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deskhub_core::config::RelayConfig;
use deskhub_core::error::AppError;
use deskhub_core::result::AppResult;
use deskhub_core::types::id::{ClientId, SessionId, TeamId, TicketId, UserId, WidgetId, WorkspaceId};
use deskhub_entity::conversation::NewConversationMessage;
use deskhub_entity::session::SessionContext;
use deskhub_entity::subscription::{ChannelKind, NewSubscription, SubscriberKind};
use deskhub_entity::team::{RoutingStrategy, Team};
use deskhub_entity::ticket::{CreateTicket, Ticket, TicketStatus};
use deskhub_entity::user::User;

use crate::channel::ChannelName;
use crate::channel::name::DOCUMENT_QA;
use crate::message::{EVENT_NEW_TICKET_REPLY, EVENT_QA_QUERY, NewTicketReply, QaQuery};
use crate::notify::{NotificationRequest, Notifier};
use crate::routing::{pick_load_balanced, pick_round_robin};
use crate::store::{
    ConversationStore, SessionStore, TeamStore, TicketStore, UserStore, WidgetStore,
};
use crate::subscription::SubscriptionManager;
use crate::tasks::spawn_logged;
use crate::transport::PubSubTransport;

/// The intake channel widget traffic is mapped to.
pub const CHAT_CHANNEL: &str = "chat";

/// A new-ticket request from a widget session channel.
#[derive(Debug, Clone)]
pub struct NewTicketRequest {
    /// The workspace the session's widget belongs to, when the
    /// subscription carried it.
    pub workspace_id: Option<Uuid>,
    /// The originating widget contact session.
    pub session_id: Uuid,
    /// The customer's first message text.
    pub first_message: String,
    /// Origin tag, `"customer"` for widget traffic.
    pub user_type: String,
}

/// Creates and routes new tickets.
pub struct TicketIntakeService {
    tickets: Arc<dyn TicketStore>,
    conversations: Arc<dyn ConversationStore>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    teams: Arc<dyn TeamStore>,
    widgets: Arc<dyn WidgetStore>,
    transport: Arc<dyn PubSubTransport>,
    notifier: Arc<dyn Notifier>,
    config: RelayConfig,
}

impl TicketIntakeService {
    /// Create an intake service over the given stores and transport.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        conversations: Arc<dyn ConversationStore>,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        teams: Arc<dyn TeamStore>,
        widgets: Arc<dyn WidgetStore>,
        transport: Arc<dyn PubSubTransport>,
        notifier: Arc<dyn Notifier>,
        config: RelayConfig,
    ) -> Self {
        Self {
            tickets,
            conversations,
            sessions,
            users,
            teams,
            widgets,
            transport,
            notifier,
            config,
        }
    }

    /// Create a ticket for a new conversation and route it.
    ///
    /// Returns the created ticket's id even when post-creation steps
    /// (seed rows, reply publish, notifications) failed; those are
    /// logged and recoverable.
    pub async fn handle_new_ticket(
        &self,
        request: NewTicketRequest,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<TicketId> {
        let (context, team) = self.resolve_context(&request).await?;

        let ticket = self
            .tickets
            .insert(&CreateTicket {
                subject: None,
                status: TicketStatus::Open,
                client_id: context.client_id,
                workspace_id: context.workspace_id,
                team_id: team.as_ref().map(|t| t.id),
                session_id: Some(context.session_id),
                ai_enabled: context.client_ai_enabled,
            })
            .await?;
        let ticket_id = TicketId::from_uuid(ticket.id);

        let assignee = self.pick_assignee(&ticket, team.as_ref()).await?;
        if let Some(agent) = assignee {
            self.tickets.set_assignee(ticket_id, agent.into()).await?;
        }

        info!(
            ticket_id = %ticket_id,
            session_id = %context.session_id,
            user_type = %request.user_type,
            ai_enabled = ticket.ai_enabled,
            assignee = assignee.map(|a| a.to_string()).unwrap_or_default(),
            "ticket created"
        );

        // The ticket exists from here on; remaining steps must not undo it.
        self.seed_conversation(&ticket, &context, assignee, &request.first_message)
            .await;
        self.publish_ticket_reply(&ticket, &context).await;

        if ticket.ai_enabled {
            self.start_qa_flow(&ticket, &context, &request.first_message, subscriptions)
                .await;
        } else {
            self.notify_agents(&ticket, team.as_ref(), assignee, &request.first_message)
                .await;
        }

        Ok(ticket_id)
    }

    /// Fetch the session context and the chat team, concurrently when the
    /// request already knows the workspace.
    async fn resolve_context(
        &self,
        request: &NewTicketRequest,
    ) -> AppResult<(SessionContext, Option<Team>)> {
        let session_id = SessionId::from_uuid(request.session_id);

        if let Some(workspace_id) = request.workspace_id {
            let (context, team) = tokio::join!(
                self.sessions.find_context(session_id),
                self.teams
                    .find_channel_team(WorkspaceId::from_uuid(workspace_id), CHAT_CHANNEL)
            );
            let context = context?.ok_or_else(|| {
                AppError::not_found(format!("session {session_id} not found"))
            })?;
            return Ok((context, team?));
        }

        let context = self
            .sessions
            .find_context(session_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("session {session_id} not found")))?;
        let team = self
            .teams
            .find_channel_team(WorkspaceId::from_uuid(context.workspace_id), CHAT_CHANNEL)
            .await?;
        Ok((context, team))
    }

    /// Decide the assignee for a fresh ticket.
    async fn pick_assignee(&self, ticket: &Ticket, team: Option<&Team>) -> AppResult<Option<Uuid>> {
        if ticket.ai_enabled {
            let bot = self
                .users
                .find_bot_agent(ClientId::from_uuid(ticket.client_id))
                .await?;
            if bot.is_none() {
                warn!(ticket_id = %ticket.id, "no bot agent configured for AI-enabled client");
            }
            return Ok(bot.map(|b| b.id));
        }

        let Some(team) = team else {
            return Ok(None);
        };
        let team_id = TeamId::from_uuid(team.id);

        let picked = match team.routing_strategy {
            RoutingStrategy::Manual => None,
            RoutingStrategy::LoadBalanced => {
                let (members, counts) = self.team_routing_inputs(team_id).await?;
                pick_load_balanced(&members, &counts)
            }
            RoutingStrategy::RoundRobin => {
                let members = self.teams.list_members(team_id).await?;
                let last = self.tickets.last_assigned_agent(team_id).await?;
                pick_round_robin(&members, last)
            }
        };
        Ok(picked.map(|id| id.into_uuid()))
    }

    async fn team_routing_inputs(
        &self,
        team_id: TeamId,
    ) -> AppResult<(Vec<User>, Vec<(UserId, i64)>)> {
        let (members, counts) = tokio::join!(
            self.teams.list_members(team_id),
            self.tickets.count_open_by_assignee(team_id)
        );
        Ok((members?, counts?))
    }

    /// Persist the welcome message and the customer's first message, in
    /// that order. Best-effort.
    async fn seed_conversation(
        &self,
        ticket: &Ticket,
        context: &SessionContext,
        assignee: Option<Uuid>,
        first_message: &str,
    ) {
        let welcome_text = self.welcome_text(context).await;
        let welcome = if ticket.ai_enabled {
            NewConversationMessage::from_bot(ticket.id, assignee, welcome_text)
        } else {
            NewConversationMessage::from_agent(ticket.id, assignee, welcome_text)
        };
        if let Err(error) = self.conversations.insert(&welcome).await {
            error!(ticket_id = %ticket.id, %error, "failed to persist welcome message");
        }

        let first = NewConversationMessage::from_customer(
            ticket.id,
            Some(context.session_id),
            first_message,
        );
        if let Err(error) = self.conversations.insert(&first).await {
            error!(ticket_id = %ticket.id, %error, "failed to persist first message");
        }
    }

    /// The welcome text configured on the session's widget, or the
    /// relay-wide default.
    async fn welcome_text(&self, context: &SessionContext) -> String {
        if let Some(widget_id) = context.widget_id {
            match self.widgets.find_by_id(WidgetId::from_uuid(widget_id)).await {
                Ok(Some(widget)) => {
                    if let Some(text) = widget.welcome_message() {
                        return text.to_string();
                    }
                }
                Ok(None) => {
                    debug!(widget_id = %widget_id, "session widget no longer exists");
                }
                Err(error) => {
                    warn!(widget_id = %widget_id, %error, "widget lookup failed");
                }
            }
        }
        self.config.default_welcome_message.clone()
    }

    /// Tell the widget which ticket its conversation landed on.
    async fn publish_ticket_reply(&self, ticket: &Ticket, context: &SessionContext) {
        let reply = NewTicketReply {
            ticket_id: ticket.id,
            session_id: context.session_id,
        };
        let payload = match serde_json::to_value(&reply) {
            Ok(payload) => payload,
            Err(error) => {
                error!(ticket_id = %ticket.id, %error, "failed to encode new_ticket_reply");
                return;
            }
        };
        let channel_name =
            ChannelName::ContactEvent(SessionId::from_uuid(context.session_id)).to_string();
        let channel = self.transport.channel(&channel_name);
        if let Err(error) = channel.publish(EVENT_NEW_TICKET_REPLY, payload).await {
            warn!(ticket_id = %ticket.id, channel = %channel_name, %error, "new_ticket_reply publish failed");
        }
    }

    /// Subscribe the session to QA results and publish the first query.
    async fn start_qa_flow(
        &self,
        ticket: &Ticket,
        context: &SessionContext,
        first_message: &str,
        subscriptions: &Arc<SubscriptionManager>,
    ) {
        let spec = NewSubscription::new(
            ChannelName::QaResults.to_string(),
            ChannelKind::QaResults,
            context.session_id,
            SubscriberKind::Session,
        )
        .with_ticket(ticket.id)
        .with_session(context.session_id)
        .with_client(ticket.client_id)
        .with_workspace(ticket.workspace_id);
        if let Err(error) = subscriptions.add_subscription(spec).await {
            error!(ticket_id = %ticket.id, %error, "failed to establish QA-results subscription");
        }

        let query = QaQuery {
            query: first_message.to_string(),
            id: ticket.id,
            client_id: ticket.client_id,
        };
        let payload = match serde_json::to_value(&query) {
            Ok(payload) => payload,
            Err(error) => {
                error!(ticket_id = %ticket.id, %error, "failed to encode QA query");
                return;
            }
        };
        let channel = self.transport.channel(DOCUMENT_QA);
        if let Err(error) = channel.publish(EVENT_QA_QUERY, payload).await {
            warn!(ticket_id = %ticket.id, %error, "QA query publish failed");
        }
    }

    /// Fan out a `new_ticket` notification: to the assignee when one
    /// exists, otherwise to the whole routed team. Fire-and-forget.
    async fn notify_agents(
        &self,
        ticket: &Ticket,
        team: Option<&Team>,
        assignee: Option<Uuid>,
        first_message: &str,
    ) {
        let recipients = if let Some(agent) = assignee {
            vec![agent.into()]
        } else if let Some(team) = team {
            match self.teams.list_members(TeamId::from_uuid(team.id)).await {
                Ok(members) => members
                    .iter()
                    .filter(|m| m.is_routable_agent())
                    .map(|m| m.id.into())
                    .collect(),
                Err(error) => {
                    error!(ticket_id = %ticket.id, %error, "failed to resolve team members");
                    return;
                }
            }
        } else {
            debug!(ticket_id = %ticket.id, "no team or assignee to notify");
            return;
        };

        let request = NotificationRequest::new(
            "new_ticket",
            recipients,
            serde_json::json!({
                "ticketId": ticket.id,
                "sessionId": ticket.session_id,
                "message": first_message,
            }),
        )
        .about(ticket.id);
        let notifier = Arc::clone(&self.notifier);
        spawn_logged("notify_new_ticket", async move {
            notifier.create_and_broadcast(request).await
        });
    }
}
