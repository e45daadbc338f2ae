//! Chatbot conversation tests: customer-to-bot forwarding, webhook
//! delivery, bot responses, and document-QA answer routing.

use serde_json::json;

use deskhub_core::types::id::{ChatbotProfileId, TicketId};
use deskhub_entity::chatbot::ChatbotProfile;
use deskhub_entity::conversation::SenderKind;
use deskhub_entity::session::SessionContext;
use deskhub_entity::subscription::{ChannelKind, NewSubscription, SubscriberKind};
use deskhub_entity::ticket::Ticket;
use deskhub_entity::user::User;
use deskhub_relay::ChannelName;
use deskhub_relay::channel::name::DOCUMENT_QA_RESULTS;

use super::helpers::{self, TestRelay};

struct BotFixture {
    session: SessionContext,
    owner: User,
    profile: ChatbotProfile,
    ticket: Ticket,
    bot_channel: String,
    conversation: String,
}

/// Seed an AI session with a chatbot profile and wire the bot channel
/// for one ticket.
async fn chatbot_fixture(relay: &TestRelay, webhook: Option<&str>) -> BotFixture {
    let session = helpers::seed_session(relay, true).await;
    let owner = helpers::bot_agent(session.client_id);
    relay.store.seed_user(owner.clone()).await;
    let mut profile = helpers::chatbot_profile(session.client_id, Some(owner.id));
    profile.webhook_url = webhook.map(str::to_string);
    relay.store.seed_profile(profile.clone()).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;

    let bot_channel = ChannelName::Chatbot {
        profile_id: ChatbotProfileId::from_uuid(profile.id),
        ticket_id: TicketId::from_uuid(ticket.id),
    }
    .to_string();
    let spec = NewSubscription::new(
        &bot_channel,
        ChannelKind::Chatbot,
        session.session_id,
        SubscriberKind::Session,
    )
    .with_ticket(ticket.id)
    .with_session(session.session_id)
    .with_chatbot_profile(profile.id);
    relay.subscribe(spec).await;

    let conversation = ChannelName::WidgetConversation(TicketId::from_uuid(ticket.id)).to_string();
    BotFixture {
        session,
        owner,
        profile,
        ticket,
        bot_channel,
        conversation,
    }
}

#[tokio::test]
async fn test_customer_message_is_persisted_then_forwarded_to_the_bot() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, None).await;
    let bot_log = relay.record_events(&fx.bot_channel).await;

    relay
        .publish(
            &fx.conversation,
            "message",
            json!({ "text": "How do I reset my password?" }),
        )
        .await;

    let rows = relay.wait_for_messages(fx.ticket.id, 1).await;
    assert_eq!(rows[0].sender_kind, SenderKind::User);
    assert_eq!(rows[0].session_id, Some(fx.session.session_id));
    assert_eq!(rows[0].body, "How do I reset my password?");

    let forwarded = bot_log.wait_for("user-message", 1).await;
    assert_eq!(forwarded[0].payload["content"], "How do I reset my password?");
    assert_eq!(forwarded[0].payload["ticketId"], json!(fx.ticket.id));

    // No webhook configured, so the gateway stays quiet.
    relay.settle().await;
    assert!(relay.gateway.sent().await.is_empty());
}

#[tokio::test]
async fn test_webhook_fires_when_the_profile_has_one() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, Some("https://bots.example.test/hook")).await;

    relay
        .publish(&fx.conversation, "message", json!({ "text": "ping" }))
        .await;

    let sent = relay.wait_for_webhooks(1).await;
    assert_eq!(sent[0].0, fx.profile.id);
    assert_eq!(sent[0].1.content, "ping");
    assert_eq!(sent[0].1.ticket_id, fx.ticket.id);
    assert_eq!(sent[0].1.session_id, Some(fx.session.session_id));
}

#[tokio::test]
async fn test_bot_response_is_persisted_and_relayed_to_the_widget() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, None).await;
    let widget_log = relay.record_events(&fx.conversation).await;

    relay
        .publish(
            &fx.bot_channel,
            "bot-response",
            json!({ "content": "Use the reset link on the login page." }),
        )
        .await;

    let rows = relay.wait_for_messages(fx.ticket.id, 1).await;
    assert_eq!(rows[0].sender_kind, SenderKind::Bot);
    assert_eq!(rows[0].sender_id, Some(fx.owner.id));
    assert_eq!(rows[0].body, "Use the reset link on the login page.");

    let replies = widget_log.wait_for("message_reply", 1).await;
    assert_eq!(
        replies[0].payload["message"],
        "Use the reset link on the login page."
    );
    assert_eq!(replies[0].payload["senderType"], "ai");
    assert_eq!(replies[0].payload["id"], json!(rows[0].id));
}

#[tokio::test]
async fn test_customer_row_lands_before_the_triggered_bot_reply() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, None).await;
    let bot_log = relay.record_events(&fx.bot_channel).await;

    relay
        .publish(
            &fx.conversation,
            "message",
            json!({ "text": "Do you ship overseas?" }),
        )
        .await;

    // Answer only once the forward arrives, like a real bot runtime.
    bot_log.wait_for("user-message", 1).await;
    relay
        .publish(
            &fx.bot_channel,
            "bot-response",
            json!({ "content": "We ship to 40 countries." }),
        )
        .await;

    let rows = relay.wait_for_messages(fx.ticket.id, 2).await;
    assert_eq!(rows[0].sender_kind, SenderKind::User);
    assert_eq!(rows[0].body, "Do you ship overseas?");
    assert_eq!(rows[1].sender_kind, SenderKind::Bot);
    assert_eq!(rows[1].body, "We ship to 40 countries.");
    assert!(rows[0].created_at <= rows[1].created_at);
}

#[tokio::test]
async fn test_bot_response_data_field_is_accepted() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, None).await;

    relay
        .publish(
            &fx.bot_channel,
            "bot-response",
            json!({ "data": "Alternate field, same answer." }),
        )
        .await;

    let rows = relay.wait_for_messages(fx.ticket.id, 1).await;
    assert_eq!(rows[0].body, "Alternate field, same answer.");
}

#[tokio::test]
async fn test_blank_bot_response_is_dropped() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, None).await;

    relay
        .publish(&fx.bot_channel, "bot-response", json!({ "content": "   " }))
        .await;
    relay.settle().await;

    assert!(relay.messages(fx.ticket.id).await.is_empty());
}

#[tokio::test]
async fn test_removing_the_subscription_detaches_both_channels() {
    let relay = TestRelay::new().await;
    let fx = chatbot_fixture(&relay, None).await;

    relay
        .subscriptions()
        .remove_subscription(&fx.bot_channel, fx.session.session_id, SubscriberKind::Session)
        .await
        .expect("remove");

    relay
        .publish(&fx.conversation, "message", json!({ "text": "still there?" }))
        .await;
    relay
        .publish(&fx.bot_channel, "bot-response", json!({ "content": "yes" }))
        .await;
    relay.settle().await;

    assert!(relay.messages(fx.ticket.id).await.is_empty());
}

#[tokio::test]
async fn test_qa_answer_reaches_only_the_matching_ticket() {
    let relay = TestRelay::new().await;

    // Two AI conversations share the answers channel.
    let first_session = helpers::seed_session(&relay, true).await;
    let second_session = helpers::seed_session(&relay, true).await;
    let first_bot = helpers::bot_agent(first_session.client_id);
    let second_bot = helpers::bot_agent(second_session.client_id);
    relay.store.seed_user(first_bot.clone()).await;
    relay.store.seed_user(second_bot.clone()).await;
    let first = relay
        .seed_ticket(&helpers::ticket_for_session(&first_session, None))
        .await;
    let second = relay
        .seed_ticket(&helpers::ticket_for_session(&second_session, None))
        .await;
    for (ticket, session) in [(&first, &first_session), (&second, &second_session)] {
        let spec = NewSubscription::new(
            DOCUMENT_QA_RESULTS,
            ChannelKind::QaResults,
            session.session_id,
            SubscriberKind::Session,
        )
        .with_ticket(ticket.id)
        .with_session(session.session_id);
        relay.subscribe(spec).await;
    }
    let widget_log = relay
        .record_events(&ChannelName::WidgetConversation(TicketId::from_uuid(first.id)).to_string())
        .await;

    relay
        .publish(
            DOCUMENT_QA_RESULTS,
            "result",
            json!({ "id": first.id, "answer": "Refunds take 3-5 business days." }),
        )
        .await;

    let rows = relay.wait_for_messages(first.id, 1).await;
    assert_eq!(rows[0].sender_kind, SenderKind::Bot);
    assert_eq!(rows[0].sender_id, Some(first_bot.id));
    assert_eq!(rows[0].body, "Refunds take 3-5 business days.");

    let replies = widget_log.wait_for("message_reply", 1).await;
    assert_eq!(replies[0].payload["from"], "bot");
    assert_eq!(replies[0].payload["to"], "customer");
    assert_eq!(replies[0].payload["senderType"], "ai");

    relay.settle().await;
    assert!(relay.messages(second.id).await.is_empty());
}

#[tokio::test]
async fn test_qa_result_without_an_answer_is_dropped() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, true).await;
    let bot = helpers::bot_agent(session.client_id);
    relay.store.seed_user(bot).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;
    let spec = NewSubscription::new(
        DOCUMENT_QA_RESULTS,
        ChannelKind::QaResults,
        session.session_id,
        SubscriberKind::Session,
    )
    .with_ticket(ticket.id)
    .with_session(session.session_id);
    relay.subscribe(spec).await;

    relay
        .publish(DOCUMENT_QA_RESULTS, "result", json!({ "id": ticket.id }))
        .await;
    relay.settle().await;

    assert!(relay.messages(ticket.id).await.is_empty());
}
