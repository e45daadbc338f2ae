//! Per-channel-kind listener wiring.
//!
//! [`HandlerDispatch`] is the single [`ChannelWiring`] implementation: it
//! decides, per channel kind, which events to subscribe and which router
//! or intake entry point each event feeds. Listener bodies never let an
//! error escape into the transport; anything that fails is logged on the
//! spot so sibling handlers keep running.

use std::sync::Arc;

use tracing::{debug, error, warn};

use async_trait::async_trait;

use deskhub_chatbot::{ChatbotGateway, SendQuestion};
use deskhub_core::error::AppError;
use deskhub_core::result::AppResult;
use deskhub_core::types::id::TicketId;
use deskhub_entity::chatbot::ChatbotProfile;
use deskhub_entity::conversation::NewConversationMessage;
use deskhub_entity::subscription::{ChannelKind, SubscriberKind, SubscriptionRecord};

use crate::channel::name::WIDGET_CONVERSATION_PREFIX;
use crate::channel::{ChannelListeners, ChannelName};
use crate::intake::{NewTicketRequest, TicketIntakeService};
use crate::message::{
    EVENT_BOT_RESPONSE, EVENT_MESSAGE, EVENT_NEW_TICKET, EVENT_USER_ACTION, EVENT_USER_MESSAGE,
    UserMessage, extract_text, normalize_payload,
};
use crate::router::MessageRouter;
use crate::store::ConversationStore;
use crate::subscription::{ChannelWiring, SubscriptionManager};
use crate::tasks::spawn_logged;
use crate::transport::{EventHandler, PubSubChannel, PubSubTransport, event_handler};

/// Wires channel listeners to the router and the intake service.
pub struct HandlerDispatch {
    router: Arc<dyn MessageRouter>,
    intake: Arc<TicketIntakeService>,
    conversations: Arc<dyn ConversationStore>,
    gateway: Arc<dyn ChatbotGateway>,
    transport: Arc<dyn PubSubTransport>,
}

impl HandlerDispatch {
    /// Create the dispatch over the router, intake, and chatbot gateway.
    pub fn new(
        router: Arc<dyn MessageRouter>,
        intake: Arc<TicketIntakeService>,
        conversations: Arc<dyn ConversationStore>,
        gateway: Arc<dyn ChatbotGateway>,
        transport: Arc<dyn PubSubTransport>,
    ) -> Self {
        Self {
            router,
            intake,
            conversations,
            gateway,
            transport,
        }
    }

    /// `new_ticket` events on a widget session channel start the ticket
    /// intake flow. The publishing widget cannot receive an error on this
    /// path, so intake failures are logged and dropped.
    async fn wire_widget_session(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<ChannelListeners> {
        let intake = Arc::clone(&self.intake);
        let subscriptions = Arc::clone(subscriptions);
        let workspace_id = record.workspace_id;
        let session_id = record.session_id.unwrap_or(record.subscriber_id);

        let handler = event_handler(move |event| {
            let intake = Arc::clone(&intake);
            let subscriptions = Arc::clone(&subscriptions);
            async move {
                let payload = normalize_payload(event.payload);
                let Some(first_message) = extract_text(&payload, &["text", "message"]) else {
                    warn!(channel = %event.channel, "new_ticket event carried no message text");
                    return;
                };
                let request = NewTicketRequest {
                    workspace_id,
                    session_id,
                    first_message,
                    user_type: "customer".to_string(),
                };
                if let Err(error) = intake.handle_new_ticket(request, &subscriptions).await {
                    error!(channel = %event.channel, %error, "new ticket intake failed");
                }
            }
        });

        let handle = channel.subscribe(EVENT_NEW_TICKET, handler).await?;
        Ok(ChannelListeners::Own(vec![handle]))
    }

    /// Widget conversation channels carry customer messages and structured
    /// user actions; both feed the router.
    async fn wire_conversation(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<ChannelListeners> {
        let ticket_id = record_ticket(record)?;
        let channel_name = record.channel_name.clone();
        let ticket_ref = channel_name
            .strip_prefix(WIDGET_CONVERSATION_PREFIX)
            .unwrap_or(&channel_name)
            .to_string();
        let session_id = record.session_id;
        let subscriber_id = record.subscriber_id;
        let subscriber_kind = record.subscriber_kind;

        let router = Arc::clone(&self.router);
        let manager = Arc::clone(subscriptions);
        let message_channel = channel_name.clone();
        let message_handler = event_handler(move |event| {
            let router = Arc::clone(&router);
            let manager = Arc::clone(&manager);
            let ticket_ref = ticket_ref.clone();
            let channel_name = message_channel.clone();
            async move {
                manager
                    .update_activity(&channel_name, subscriber_id, subscriber_kind)
                    .await;
                if let Err(error) = router
                    .handle_widget_conversation_event(
                        &ticket_ref,
                        event.payload,
                        session_id,
                        &manager,
                        &channel_name,
                    )
                    .await
                {
                    error!(channel = %channel_name, %error, "conversation message handler failed");
                }
            }
        });
        let message = channel.subscribe(EVENT_MESSAGE, message_handler).await?;

        let router = Arc::clone(&self.router);
        let action_channel = channel_name.clone();
        let action_handler = event_handler(move |event| {
            let router = Arc::clone(&router);
            let channel_name = action_channel.clone();
            async move {
                if let Err(error) = router
                    .handle_user_action(ticket_id, event.payload, session_id)
                    .await
                {
                    error!(channel = %channel_name, %error, "user action handler failed");
                }
            }
        });
        let action = channel.subscribe(EVENT_USER_ACTION, action_handler).await?;

        Ok(ChannelListeners::Own(vec![message, action]))
    }

    /// Agent-facing ticket channels carry agent replies back toward the
    /// customer widget.
    async fn wire_ticket(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<ChannelListeners> {
        let ticket_id = record_ticket(record)?;
        let session_id = record.session_id;
        let agent_id =
            (record.subscriber_kind == SubscriberKind::Agent).then_some(record.subscriber_id);
        let channel_name = record.channel_name.clone();
        let subscriber_id = record.subscriber_id;
        let subscriber_kind = record.subscriber_kind;

        let router = Arc::clone(&self.router);
        let manager = Arc::clone(subscriptions);
        let handler = event_handler(move |event| {
            let router = Arc::clone(&router);
            let manager = Arc::clone(&manager);
            let channel_name = channel_name.clone();
            async move {
                manager
                    .update_activity(&channel_name, subscriber_id, subscriber_kind)
                    .await;
                if let Err(error) = router
                    .handle_ticket_message(ticket_id, event.payload, session_id, agent_id)
                    .await
                {
                    error!(channel = %channel_name, %error, "ticket message handler failed");
                }
            }
        });

        let handle = channel.subscribe(EVENT_MESSAGE, handler).await?;
        Ok(ChannelListeners::Own(vec![handle]))
    }

    /// Chatbot channels wire two sides: the bot's replies on its own
    /// channel, and the customer's messages on the paired widget
    /// conversation channel. Teardown must detach both, so the pair is
    /// returned as a structured handle.
    async fn wire_chatbot(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        profile: Option<&ChatbotProfile>,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<ChannelListeners> {
        let profile = profile.ok_or_else(|| {
            AppError::validation(format!(
                "chatbot subscription {} has no resolved profile",
                record.id
            ))
        })?;
        let ticket_id = record_ticket(record)?;
        let session_id = record.session_id;
        let bot_user_id = profile.owner_user_id;

        let router = Arc::clone(&self.router);
        let reply_channel = record.channel_name.clone();
        let reply_handler = event_handler(move |event| {
            let router = Arc::clone(&router);
            let channel_name = reply_channel.clone();
            async move {
                if let Err(error) = router
                    .handle_bot_response(ticket_id, event.payload, session_id, bot_user_id)
                    .await
                {
                    error!(channel = %channel_name, %error, "bot response handler failed");
                }
            }
        });
        let bot_response = channel.subscribe(EVENT_BOT_RESPONSE, reply_handler).await?;

        let conversation_channel = self
            .transport
            .channel(&ChannelName::WidgetConversation(ticket_id).to_string());
        let widget_message = conversation_channel
            .subscribe(
                EVENT_MESSAGE,
                self.chatbot_companion_handler(channel, record, profile, subscriptions, ticket_id),
            )
            .await?;

        Ok(ChannelListeners::Chatbot {
            bot_response,
            widget_message,
        })
    }

    /// Customer messages on the paired conversation channel are persisted,
    /// then forwarded to the bot. The persisted row must land before the
    /// forward so the bot's reply row can never precede it; a persistence
    /// failure is logged and does not block forwarding.
    fn chatbot_companion_handler(
        &self,
        chatbot_channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        profile: &ChatbotProfile,
        subscriptions: &Arc<SubscriptionManager>,
        ticket_id: TicketId,
    ) -> EventHandler {
        let conversations = Arc::clone(&self.conversations);
        let gateway = Arc::clone(&self.gateway);
        let manager = Arc::clone(subscriptions);
        let profile = profile.clone();
        let channel_name = record.channel_name.clone();
        let subscriber_id = record.subscriber_id;
        let subscriber_kind = record.subscriber_kind;
        let session_id = record.session_id;
        let ticket_uuid = ticket_id.into_uuid();

        event_handler(move |event| {
            let conversations = Arc::clone(&conversations);
            let gateway = Arc::clone(&gateway);
            let manager = Arc::clone(&manager);
            let chatbot_channel = Arc::clone(&chatbot_channel);
            let profile = profile.clone();
            let channel_name = channel_name.clone();
            async move {
                let payload = normalize_payload(event.payload);
                let Some(content) = extract_text(&payload, &["text", "content"]) else {
                    debug!(channel = %event.channel, "chatbot companion event carried no text");
                    return;
                };

                manager
                    .update_activity(&channel_name, subscriber_id, subscriber_kind)
                    .await;

                let row = NewConversationMessage::from_customer(ticket_uuid, session_id, &content);
                if let Err(error) = conversations.insert(&row).await {
                    error!(ticket_id = %ticket_uuid, %error, "failed to persist customer message for bot");
                }

                let forward = UserMessage {
                    content: content.clone(),
                    ticket_id: ticket_uuid,
                    session_id,
                };
                match serde_json::to_value(&forward) {
                    Ok(value) => {
                        if let Err(error) =
                            chatbot_channel.publish(EVENT_USER_MESSAGE, value).await
                        {
                            warn!(ticket_id = %ticket_uuid, %error, "user-message forward failed");
                        }
                    }
                    Err(error) => {
                        error!(ticket_id = %ticket_uuid, %error, "failed to encode user-message");
                    }
                }

                if profile.webhook_url.is_some() {
                    let question = SendQuestion {
                        content,
                        ticket_id: ticket_uuid,
                        session_id,
                    };
                    spawn_logged("chatbot_webhook", async move {
                        gateway.send_question(&profile, &question).await
                    });
                }
            }
        })
    }

    /// The shared QA answer channel: every event is delivered; the router
    /// keeps only answers addressed to this subscription's ticket.
    async fn wire_qa_results(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
    ) -> AppResult<ChannelListeners> {
        let ticket_id = record_ticket(record)?;
        let session_id = record.session_id;
        let channel_name = record.channel_name.clone();

        let router = Arc::clone(&self.router);
        let handler = event_handler(move |event| {
            let router = Arc::clone(&router);
            let channel_name = channel_name.clone();
            async move {
                if let Err(error) = router
                    .handle_qa_result(ticket_id, event.payload, session_id)
                    .await
                {
                    error!(channel = %channel_name, %error, "qa result handler failed");
                }
            }
        });

        let handle = channel.subscribe_all(handler).await?;
        Ok(ChannelListeners::Own(vec![handle]))
    }
}

#[async_trait]
impl ChannelWiring for HandlerDispatch {
    async fn wire(
        &self,
        channel: Arc<dyn PubSubChannel>,
        record: &SubscriptionRecord,
        profile: Option<&ChatbotProfile>,
        subscriptions: &Arc<SubscriptionManager>,
    ) -> AppResult<ChannelListeners> {
        match record.channel_kind {
            ChannelKind::WidgetSession => {
                self.wire_widget_session(channel, record, subscriptions).await
            }
            ChannelKind::Conversation => {
                self.wire_conversation(channel, record, subscriptions).await
            }
            ChannelKind::Ticket => self.wire_ticket(channel, record, subscriptions).await,
            ChannelKind::Chatbot => {
                self.wire_chatbot(channel, record, profile, subscriptions).await
            }
            ChannelKind::QaResults => self.wire_qa_results(channel, record).await,
        }
    }
}

/// Resolve the ticket a subscription is scoped to, from the record's own
/// context or from the channel name.
fn record_ticket(record: &SubscriptionRecord) -> AppResult<TicketId> {
    record
        .ticket_id
        .map(TicketId::from_uuid)
        .or_else(|| ChannelName::parse(&record.channel_name).and_then(|name| name.ticket_id()))
        .ok_or_else(|| {
            AppError::validation(format!(
                "subscription {} has no ticket context",
                record.id
            ))
        })
}
