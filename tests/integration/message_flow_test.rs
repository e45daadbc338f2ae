//! Conversation routing tests: customer-to-agent relay, agent replies,
//! offline notifications, and structured user actions.

use serde_json::json;
use uuid::Uuid;

use deskhub_core::types::id::{TicketId, UserId};
use deskhub_entity::conversation::{MessageKind, SenderKind};
use deskhub_entity::session::SessionContext;
use deskhub_entity::subscription::{ChannelKind, NewSubscription, SubscriberKind};
use deskhub_entity::team::RoutingStrategy;
use deskhub_entity::ticket::Ticket;
use deskhub_relay::ChannelName;
use deskhub_relay::store::TicketStore;

use super::helpers::{self, TestRelay};

/// Open a ticket for the session and wire its widget conversation
/// channel, the way a connecting widget client does.
async fn open_conversation(
    relay: &TestRelay,
    session: &SessionContext,
    team_id: Option<Uuid>,
) -> (Ticket, String) {
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(session, team_id))
        .await;
    let channel = ChannelName::WidgetConversation(TicketId::from_uuid(ticket.id)).to_string();
    let spec = NewSubscription::new(
        &channel,
        ChannelKind::Conversation,
        session.session_id,
        SubscriberKind::Session,
    )
    .with_ticket(ticket.id)
    .with_session(session.session_id);
    relay.subscribe(spec).await;
    (ticket, channel)
}

/// Put an agent live on the ticket channel.
async fn watch_ticket(relay: &TestRelay, ticket: &Ticket, agent_id: Uuid) -> String {
    let channel = ChannelName::Ticket(TicketId::from_uuid(ticket.id)).to_string();
    let spec = NewSubscription::new(
        &channel,
        ChannelKind::Ticket,
        agent_id,
        SubscriberKind::Agent,
    )
    .with_ticket(ticket.id);
    relay.subscribe(spec).await;
    channel
}

#[tokio::test]
async fn test_customer_message_reaches_the_live_agent_channel() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;
    let agent = helpers::agent(session.client_id);
    relay.store.seed_user(agent.clone()).await;
    let ticket_channel = watch_ticket(&relay, &ticket, agent.id).await;
    let agent_log = relay.record_events(&ticket_channel).await;

    relay
        .publish(&conversation, "message", json!({ "text": "Where is my order?" }))
        .await;

    let rows = relay.wait_for_messages(ticket.id, 1).await;
    assert_eq!(rows[0].sender_kind, SenderKind::User);
    assert_eq!(rows[0].body, "Where is my order?");
    assert_eq!(rows[0].session_id, Some(session.session_id));

    let relayed = agent_log.wait_for("message", 1).await;
    assert_eq!(relayed[0].payload["message"], "Where is my order?");
    assert_eq!(relayed[0].payload["senderType"], "user");
    assert_eq!(relayed[0].payload["ticketId"], json!(ticket.id));
    assert_eq!(relayed[0].payload["conversationId"], json!(rows[0].id));
}

#[tokio::test]
async fn test_relayed_customer_envelope_is_not_mistaken_for_an_agent_reply() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;
    let agent = helpers::agent(session.client_id);
    relay.store.seed_user(agent.clone()).await;
    let ticket_channel = watch_ticket(&relay, &ticket, agent.id).await;
    let agent_log = relay.record_events(&ticket_channel).await;

    relay
        .publish(&conversation, "message", json!({ "text": "hello?" }))
        .await;

    // The copy on the agent channel carries senderType "user"; the
    // ticket listener must not persist it a second time.
    agent_log.wait_for("message", 1).await;
    relay.settle().await;
    assert_eq!(relay.messages(ticket.id).await.len(), 1);
}

#[tokio::test]
async fn test_offline_assignee_gets_a_notification() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;
    let agent = helpers::agent(session.client_id);
    relay.store.seed_user(agent.clone()).await;
    relay
        .store
        .set_assignee(
            TicketId::from_uuid(ticket.id),
            UserId::from_uuid(agent.id),
        )
        .await
        .expect("assign");
    let inbox =
        relay.record_events(&ChannelName::User(UserId::from_uuid(agent.id)).to_string()).await;

    relay
        .publish(&conversation, "message", json!({ "text": "Anyone there?" }))
        .await;

    let notifications = relay.wait_for_notifications(1).await;
    let (notification, recipients) = &notifications[0];
    assert_eq!(notification.kind, "new_message");
    assert_eq!(notification.entity_id, Some(ticket.id));
    assert_eq!(notification.payload["message"], "Anyone there?");
    assert_eq!(recipients.as_slice(), &[agent.id]);

    // The fan-out also pushes to the agent's personal channel.
    let pushed = inbox.wait_for("notification", 1).await;
    assert_eq!(pushed[0].payload["kind"], "new_message");
}

#[tokio::test]
async fn test_offline_unassigned_ticket_notifies_the_team() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::Manual);
    relay.store.seed_team(team.clone()).await;
    let agents = helpers::sorted_agents(session.client_id, 2);
    for member in &agents {
        relay.store.seed_user(member.clone()).await;
        relay.store.seed_member(team.id, member.id).await;
    }
    let (ticket, conversation) = open_conversation(&relay, &session, Some(team.id)).await;

    relay
        .publish(&conversation, "message", json!({ "text": "Is anyone around?" }))
        .await;

    let notifications = relay.wait_for_notifications(1).await;
    let (notification, recipients) = &notifications[0];
    assert_eq!(notification.kind, "new_message");
    assert_eq!(notification.entity_id, Some(ticket.id));
    let mut got = recipients.clone();
    got.sort();
    let mut want = vec![agents[0].id, agents[1].id];
    want.sort();
    assert_eq!(got, want);
}

#[tokio::test]
async fn test_agent_reply_is_persisted_and_relayed_to_the_widget() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;
    let agent = helpers::agent(session.client_id);
    relay.store.seed_user(agent.clone()).await;
    let ticket_channel = watch_ticket(&relay, &ticket, agent.id).await;
    let widget_log = relay.record_events(&conversation).await;

    relay
        .publish(&ticket_channel, "message", json!({ "text": "Taking a look now" }))
        .await;

    let rows = relay.wait_for_messages(ticket.id, 1).await;
    assert_eq!(rows[0].sender_kind, SenderKind::Agent);
    assert_eq!(rows[0].sender_id, Some(agent.id));
    assert_eq!(rows[0].body, "Taking a look now");

    let replies = widget_log.wait_for("message_reply", 1).await;
    assert_eq!(replies[0].payload["message"], "Taking a look now");
    assert_eq!(replies[0].payload["senderType"], "agent");
    assert_eq!(replies[0].payload["from"], "agent");
    assert_eq!(replies[0].payload["to"], "customer");
    assert_eq!(replies[0].payload["id"], json!(rows[0].id));
}

#[tokio::test]
async fn test_data_collection_action_merges_session_fields() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (_ticket, conversation) = open_conversation(&relay, &session, None).await;

    relay
        .publish(
            &conversation,
            "user_action",
            json!({
                "action": "data_collection",
                "fields": { "email": "casey@example.test", "topic": "billing" }
            }),
        )
        .await;

    let fields = relay.wait_for_session_fields(session.session_id).await;
    assert_eq!(
        fields,
        json!({ "email": "casey@example.test", "topic": "billing" })
    );
}

#[tokio::test]
async fn test_action_button_is_recorded_in_the_conversation() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;

    relay
        .publish(
            &conversation,
            "user_action",
            json!({ "action": "action_button", "label": "Talk to a human" }),
        )
        .await;

    let rows = relay.wait_for_messages(ticket.id, 1).await;
    assert_eq!(rows[0].message_kind, MessageKind::Action);
    assert_eq!(rows[0].sender_kind, SenderKind::User);
    assert_eq!(rows[0].body, "Talk to a human");
}

#[tokio::test]
async fn test_csat_rating_is_recorded_on_the_ticket() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;

    relay
        .publish(
            &conversation,
            "user_action",
            json!({ "action": "csat", "rating": 4 }),
        )
        .await;

    for _ in 0..200 {
        if relay.ticket(ticket.id).await.csat_rating.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(relay.ticket(ticket.id).await.csat_rating, Some(4));
}

#[tokio::test]
async fn test_out_of_range_csat_is_dropped() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;

    relay
        .publish(
            &conversation,
            "user_action",
            json!({ "action": "csat", "rating": 9 }),
        )
        .await;
    relay.settle().await;

    assert_eq!(relay.ticket(ticket.id).await.csat_rating, None);
}

#[tokio::test]
async fn test_string_encoded_payloads_are_normalized() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;

    // Some widget builds double-encode the payload as a JSON string.
    relay
        .publish(
            &conversation,
            "message",
            json!(r#"{"text":"hi from an old widget"}"#),
        )
        .await;

    let rows = relay.wait_for_messages(ticket.id, 1).await;
    assert_eq!(rows[0].body, "hi from an old widget");
}

#[tokio::test]
async fn test_attachment_fields_are_stored() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let (ticket, conversation) = open_conversation(&relay, &session, None).await;

    relay
        .publish(
            &conversation,
            "message",
            json!({
                "text": "see attached",
                "attachmentType": "image/png",
                "attachmentUrl": "https://cdn.example.test/shot.png"
            }),
        )
        .await;

    let rows = relay.wait_for_messages(ticket.id, 1).await;
    assert_eq!(rows[0].message_kind, MessageKind::Attachment);
    assert_eq!(rows[0].attachment_type.as_deref(), Some("image/png"));
    assert_eq!(
        rows[0].attachment_url.as_deref(),
        Some("https://cdn.example.test/shot.png")
    );
}

#[tokio::test]
async fn test_traffic_touches_subscription_activity() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;
    let channel = ChannelName::WidgetConversation(TicketId::from_uuid(ticket.id)).to_string();
    let record = relay
        .subscribe(
            NewSubscription::new(
                &channel,
                ChannelKind::Conversation,
                session.session_id,
                SubscriberKind::Session,
            )
            .with_ticket(ticket.id)
            .with_session(session.session_id),
        )
        .await;
    let before = record.last_activity;

    relay.publish(&channel, "message", json!({ "text": "ping" })).await;
    relay.wait_for_messages(ticket.id, 1).await;

    for _ in 0..200 {
        let rows = relay.store.subscription_rows().await;
        if rows.iter().any(|r| r.id == record.id && r.last_activity > before) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("subscription activity was never touched");
}
