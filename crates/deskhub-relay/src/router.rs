//! Message routing between customer widgets, agents, and bots.
//!
//! Each routing function receives already-resolved ticket context from
//! the channel dispatch. Validation failures drop the event with a
//! warning; a missing ticket drops it with an error; persistence
//! failures propagate to the listener boundary, which logs them.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use deskhub_core::result::AppResult;
use deskhub_core::types::id::{ClientId, SessionId, TicketId, UserId};
use deskhub_entity::conversation::{NewConversationMessage, SenderKind};
use deskhub_entity::subscription::{ChannelKind, NewSubscription, SubscriberKind};
use deskhub_entity::ticket::Ticket;
use deskhub_entity::user::User;

use crate::channel::ChannelName;
use crate::channel::name::DOCUMENT_QA;
use crate::message::{
    self, BotResponse, EVENT_MESSAGE, EVENT_MESSAGE_REPLY, EVENT_QA_QUERY, MessageReply, QaQuery,
    QaResult, UserAction, UserActionKind, WidgetMessage,
};
use crate::notify::{NotificationRequest, Notifier};
use crate::store::{ConversationStore, SessionStore, TeamStore, TicketStore, UserStore};
use crate::subscription::SubscriptionManager;
use crate::tasks::spawn_logged;
use crate::transport::PubSubTransport;

/// Routing operations invoked by channel listeners.
#[async_trait]
pub trait MessageRouter: Send + Sync {
    /// Route a customer message arriving on a widget conversation channel.
    async fn handle_widget_conversation_event(
        &self,
        ticket_ref: &str,
        payload: Value,
        session_id: Option<Uuid>,
        subscriptions: &Arc<SubscriptionManager>,
        channel_name: &str,
    ) -> AppResult<()>;

    /// Route an agent reply arriving on a ticket channel.
    async fn handle_ticket_message(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
        agent_id: Option<Uuid>,
    ) -> AppResult<()>;

    /// Run a structured customer action (form, button, CSAT).
    async fn handle_user_action(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
    ) -> AppResult<()>;

    /// Persist and relay a chatbot reply.
    async fn handle_bot_response(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
        bot_user_id: Option<Uuid>,
    ) -> AppResult<()>;

    /// Persist and relay a document-QA answer for one ticket.
    async fn handle_qa_result(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
    ) -> AppResult<()>;
}

/// The production router.
pub struct ConversationRouter {
    tickets: Arc<dyn TicketStore>,
    conversations: Arc<dyn ConversationStore>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    teams: Arc<dyn TeamStore>,
    transport: Arc<dyn PubSubTransport>,
    notifier: Arc<dyn Notifier>,
}

impl ConversationRouter {
    /// Create a router over the given stores and transport.
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        conversations: Arc<dyn ConversationStore>,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        teams: Arc<dyn TeamStore>,
        transport: Arc<dyn PubSubTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tickets,
            conversations,
            sessions,
            users,
            teams,
            transport,
            notifier,
        }
    }

    /// Load a ticket, logging and returning `None` when it is missing.
    async fn require_ticket(&self, ticket_id: TicketId, flow: &str) -> AppResult<Option<Ticket>> {
        let ticket = self.tickets.find_by_id(ticket_id).await?;
        if ticket.is_none() {
            error!(ticket_id = %ticket_id, flow, "ticket not found, dropping event");
        }
        Ok(ticket)
    }

    /// Publish an event, logging transport failures without retrying.
    async fn publish(&self, channel_name: &str, event: &str, payload: Value) {
        let channel = self.transport.channel(channel_name);
        if let Err(error) = channel.publish(event, payload).await {
            warn!(channel = channel_name, event, %error, "publish failed");
        }
    }

    async fn publish_reply(&self, ticket_id: TicketId, reply: &MessageReply) -> AppResult<()> {
        let channel_name = ChannelName::WidgetConversation(ticket_id).to_string();
        let payload = serde_json::to_value(reply)?;
        self.publish(&channel_name, EVENT_MESSAGE_REPLY, payload).await;
        Ok(())
    }

    /// Ensure the shared QA-results channel is subscribed for this ticket,
    /// keyed by the customer session, then publish the query.
    async fn route_to_qa(
        &self,
        subscriptions: &Arc<SubscriptionManager>,
        ticket: &Ticket,
        session_id: Option<Uuid>,
        text: &str,
    ) -> AppResult<()> {
        let subscriber = session_id.or(ticket.session_id);
        match subscriber {
            Some(session) => {
                let spec = NewSubscription::new(
                    ChannelName::QaResults.to_string(),
                    ChannelKind::QaResults,
                    session,
                    SubscriberKind::Session,
                )
                .with_ticket(ticket.id)
                .with_session(session)
                .with_client(ticket.client_id)
                .with_workspace(ticket.workspace_id);
                subscriptions.add_subscription(spec).await?;
            }
            None => {
                warn!(
                    ticket_id = %ticket.id,
                    "no session to key the QA-results subscription, publishing query anyway"
                );
            }
        }

        let query = QaQuery {
            query: text.to_string(),
            id: ticket.id,
            client_id: ticket.client_id,
        };
        self.publish(DOCUMENT_QA, EVENT_QA_QUERY, serde_json::to_value(&query)?)
            .await;
        Ok(())
    }

    /// Relay to the live agent channel, or fall back to a notification.
    async fn route_to_agents(
        &self,
        subscriptions: &Arc<SubscriptionManager>,
        ticket: &Ticket,
        session_id: Option<Uuid>,
        text: &str,
        conversation_id: Uuid,
    ) -> AppResult<()> {
        let ticket_channel = ChannelName::Ticket(TicketId::from_uuid(ticket.id)).to_string();
        let watchers = subscriptions.get_channel_subscriptions(&ticket_channel).await?;
        if !watchers.is_empty() {
            let reply = MessageReply::text(ticket.id, text, SenderKind::User, session_id)
                .with_conversation(conversation_id);
            self.publish(&ticket_channel, EVENT_MESSAGE, serde_json::to_value(&reply)?)
                .await;
            return Ok(());
        }

        // Nobody is watching live; leave a persisted notification instead.
        let recipients = self.offline_recipients(ticket).await?;
        let request = NotificationRequest::new(
            "new_message",
            recipients,
            serde_json::json!({
                "ticketId": ticket.id,
                "sessionId": session_id,
                "message": text,
            }),
        )
        .about(ticket.id);
        let notifier = Arc::clone(&self.notifier);
        spawn_logged("notify_new_message", async move {
            notifier.create_and_broadcast(request).await
        });
        Ok(())
    }

    /// Who gets told about unseen customer traffic: the assignee when one
    /// exists, otherwise the whole routed team.
    async fn offline_recipients(&self, ticket: &Ticket) -> AppResult<Vec<UserId>> {
        if let Some(assignee) = ticket.assigned_to {
            return Ok(vec![assignee.into()]);
        }
        let Some(team_id) = ticket.team_id else {
            return Ok(Vec::new());
        };
        let members = self.teams.list_members(team_id.into()).await?;
        Ok(members
            .iter()
            .filter(|m| m.is_routable_agent())
            .map(|m| m.id.into())
            .collect())
    }

    async fn run_data_collection(
        &self,
        ticket_id: TicketId,
        session_id: Option<Uuid>,
        action: &UserAction,
    ) -> AppResult<()> {
        let Some(fields) = action.fields.as_ref().filter(|f| f.is_object()) else {
            warn!(ticket_id = %ticket_id, "data_collection action without fields, dropping");
            return Ok(());
        };
        let session = match session_id {
            Some(session) => Some(session),
            None => self
                .tickets
                .find_by_id(ticket_id)
                .await?
                .and_then(|t| t.session_id),
        };
        let Some(session) = session else {
            warn!(ticket_id = %ticket_id, "data_collection action without a session, dropping");
            return Ok(());
        };
        self.sessions
            .merge_fields(SessionId::from_uuid(session), fields)
            .await?;
        debug!(ticket_id = %ticket_id, session_id = %session, "data collection fields merged");
        Ok(())
    }

    async fn run_action_button(
        &self,
        ticket_id: TicketId,
        session_id: Option<Uuid>,
        action: &UserAction,
    ) -> AppResult<()> {
        let text = action
            .label
            .as_deref()
            .or(action.value.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(text) = text else {
            warn!(ticket_id = %ticket_id, "action_button without label or value, dropping");
            return Ok(());
        };
        let message =
            NewConversationMessage::from_customer(ticket_id.into_uuid(), session_id, text)
                .as_action();
        self.conversations.insert(&message).await?;
        debug!(ticket_id = %ticket_id, "action button recorded");
        Ok(())
    }

    async fn run_csat(&self, ticket_id: TicketId, action: &UserAction) -> AppResult<()> {
        let Some(rating) = action.rating else {
            warn!(ticket_id = %ticket_id, "csat action without a rating, dropping");
            return Ok(());
        };
        if !(1..=5).contains(&rating) {
            warn!(ticket_id = %ticket_id, rating, "csat rating out of range, dropping");
            return Ok(());
        }
        self.tickets.set_csat(ticket_id, rating).await?;
        debug!(ticket_id = %ticket_id, rating, "csat rating recorded");
        Ok(())
    }

    /// The bot-agent user a client attributes automated replies to.
    async fn bot_sender(&self, client_id: Uuid) -> AppResult<Option<User>> {
        self.users
            .find_bot_agent(ClientId::from_uuid(client_id))
            .await
    }
}

#[async_trait]
impl MessageRouter for ConversationRouter {
    async fn handle_widget_conversation_event(
        &self,
        ticket_ref: &str,
        payload: Value,
        session_id: Option<Uuid>,
        subscriptions: &Arc<SubscriptionManager>,
        channel_name: &str,
    ) -> AppResult<()> {
        let Ok(ticket_id) = TicketId::from_str(ticket_ref) else {
            warn!(ticket_ref, channel = channel_name, "malformed ticket id, dropping message");
            return Ok(());
        };

        let payload = message::normalize_payload(payload);
        let Some(text) = message::extract_text(&payload, &["text", "content"]) else {
            debug!(ticket_id = %ticket_id, "empty widget message, dropping");
            return Ok(());
        };

        let Some(ticket) = self.require_ticket(ticket_id, "widget_message").await? else {
            return Ok(());
        };
        let session_id = session_id.or(ticket.session_id);

        // Customer row first; replies triggered below must sort after it.
        let attachments: WidgetMessage =
            serde_json::from_value(payload.clone()).unwrap_or_default();
        let mut message =
            NewConversationMessage::from_customer(ticket.id, session_id, text.clone());
        if let (Some(kind), Some(url)) = (attachments.attachment_type, attachments.attachment_url)
        {
            message = message.with_attachment(kind, url);
        }
        let stored = self.conversations.insert(&message).await?;

        if ticket.ai_enabled {
            self.route_to_qa(subscriptions, &ticket, session_id, &text)
                .await
        } else {
            self.route_to_agents(subscriptions, &ticket, session_id, &text, stored.id)
                .await
        }
    }

    async fn handle_ticket_message(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
        agent_id: Option<Uuid>,
    ) -> AppResult<()> {
        let payload = message::normalize_payload(payload);

        // The relay publishes customer traffic onto this channel under the
        // same event name; those envelopes carry a sender tag and must not
        // be re-routed as agent replies.
        if let Some(sender) = payload.get("senderType").and_then(Value::as_str) {
            if sender != "agent" {
                debug!(ticket_id = %ticket_id, sender, "ignoring relayed envelope");
                return Ok(());
            }
        }

        let Some(text) = message::extract_text(&payload, &["text", "content", "message"]) else {
            debug!(ticket_id = %ticket_id, "empty agent message, dropping");
            return Ok(());
        };

        // Persist best-effort: the customer still gets the live reply even
        // if the row cannot be written right now.
        let message =
            NewConversationMessage::from_agent(ticket_id.into_uuid(), agent_id, text.clone());
        let stored = match self.conversations.insert(&message).await {
            Ok(row) => Some(row),
            Err(error) => {
                error!(ticket_id = %ticket_id, %error, "failed to persist agent message");
                None
            }
        };

        let mut reply =
            MessageReply::text(ticket_id.into_uuid(), text, SenderKind::Agent, session_id)
                .with_direction("agent", "customer");
        if let Some(row) = stored {
            reply = reply.with_conversation(row.id);
        }
        self.publish_reply(ticket_id, &reply).await
    }

    async fn handle_user_action(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
    ) -> AppResult<()> {
        let payload = message::normalize_payload(payload);
        let action: UserAction = match serde_json::from_value(payload) {
            Ok(action) => action,
            Err(error) => {
                warn!(ticket_id = %ticket_id, %error, "unrecognized user action, dropping");
                return Ok(());
            }
        };

        match action.action {
            UserActionKind::DataCollection => {
                self.run_data_collection(ticket_id, session_id, &action).await
            }
            UserActionKind::ActionButton => {
                self.run_action_button(ticket_id, session_id, &action).await
            }
            UserActionKind::Csat => self.run_csat(ticket_id, &action).await,
        }
    }

    async fn handle_bot_response(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
        bot_user_id: Option<Uuid>,
    ) -> AppResult<()> {
        let payload = message::normalize_payload(payload);
        let response: BotResponse = serde_json::from_value(payload).unwrap_or_default();
        let Some(text) = response.text() else {
            debug!(ticket_id = %ticket_id, "bot response without text, dropping");
            return Ok(());
        };

        let Some(ticket) = self.require_ticket(ticket_id, "bot_response").await? else {
            return Ok(());
        };
        let session_id = session_id.or(ticket.session_id);

        let message = NewConversationMessage::from_bot(ticket.id, bot_user_id, text);
        let stored = self.conversations.insert(&message).await?;

        let reply = MessageReply::text(ticket.id, text, SenderKind::Bot, session_id)
            .with_conversation(stored.id);
        self.publish_reply(ticket_id, &reply).await
    }

    async fn handle_qa_result(
        &self,
        ticket_id: TicketId,
        payload: Value,
        session_id: Option<Uuid>,
    ) -> AppResult<()> {
        let payload = message::normalize_payload(payload);
        let result: QaResult = serde_json::from_value(payload).unwrap_or_default();
        if result.id != Some(ticket_id.into_uuid()) {
            return Ok(());
        }
        let answer = result
            .answer
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(answer) = answer else {
            debug!(ticket_id = %ticket_id, "qa result without an answer, dropping");
            return Ok(());
        };

        let Some(ticket) = self.require_ticket(ticket_id, "qa_result").await? else {
            return Ok(());
        };
        let session_id = session_id.or(ticket.session_id);

        let bot = self.bot_sender(ticket.client_id).await?;
        let message =
            NewConversationMessage::from_bot(ticket.id, bot.map(|b| b.id), answer);
        let stored = self.conversations.insert(&message).await?;

        let reply = MessageReply::text(ticket.id, answer, SenderKind::Bot, session_id)
            .with_conversation(stored.id)
            .with_direction("bot", "customer");
        self.publish_reply(ticket_id, &reply).await
    }
}
