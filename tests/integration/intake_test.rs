//! Ticket intake tests: session resolution, per-team routing
//! strategies, conversation seeding, and the announcement events.

use serde_json::json;
use uuid::Uuid;

use deskhub_core::config::RelayConfig;
use deskhub_core::error::ErrorKind;
use deskhub_core::types::id::SessionId;
use deskhub_entity::conversation::SenderKind;
use deskhub_entity::subscription::{ChannelKind, NewSubscription, SubscriberKind};
use deskhub_entity::team::RoutingStrategy;
use deskhub_relay::ChannelName;
use deskhub_relay::channel::name::{DOCUMENT_QA, DOCUMENT_QA_RESULTS};
use deskhub_relay::store::TicketStore;

use super::helpers::{self, TestRelay};

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let relay = TestRelay::new().await;
    let ghost = helpers::contact_session(Uuid::new_v4(), Uuid::new_v4(), false);

    let error = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&ghost, "hello"),
            relay.subscriptions(),
        )
        .await
        .expect_err("unseeded session must fail");

    assert_eq!(error.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_manual_strategy_leaves_the_ticket_unassigned() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::Manual);
    let member = helpers::agent(session.client_id);
    relay.store.seed_team(team.clone()).await;
    relay.store.seed_user(member.clone()).await;
    relay.store.seed_member(team.id, member.id).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "I need a refund"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let ticket = relay.ticket(ticket_id.into_uuid()).await;
    assert_eq!(ticket.team_id, Some(team.id));
    assert_eq!(ticket.assigned_to, None);
    assert_eq!(ticket.session_id, Some(session.session_id));
    assert!(!ticket.ai_enabled);
}

#[tokio::test]
async fn test_round_robin_rotates_across_tickets() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::RoundRobin);
    relay.store.seed_team(team.clone()).await;
    let agents = helpers::sorted_agents(session.client_id, 2);
    for member in &agents {
        relay.store.seed_user(member.clone()).await;
        relay.store.seed_member(team.id, member.id).await;
    }

    let intake = relay.intake();
    let mut assignees = Vec::new();
    for text in ["one", "two", "three"] {
        let ticket_id = intake
            .handle_new_ticket(
                helpers::new_ticket_request(&session, text),
                relay.subscriptions(),
            )
            .await
            .expect("intake");
        assignees.push(relay.ticket(ticket_id.into_uuid()).await.assigned_to);
    }

    assert_eq!(
        assignees,
        vec![Some(agents[0].id), Some(agents[1].id), Some(agents[0].id)]
    );
}

#[tokio::test]
async fn test_load_balanced_picks_the_least_loaded_member() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::LoadBalanced);
    relay.store.seed_team(team.clone()).await;
    let agents = helpers::sorted_agents(session.client_id, 2);
    for member in &agents {
        relay.store.seed_user(member.clone()).await;
        relay.store.seed_member(team.id, member.id).await;
    }

    // Backlog: three open tickets on the first agent, one on the second.
    for (agent_id, count) in [(agents[0].id, 3), (agents[1].id, 1)] {
        for _ in 0..count {
            let ticket = relay
                .seed_ticket(&helpers::ticket_for_session(&session, Some(team.id)))
                .await;
            relay
                .store
                .set_assignee(ticket.id.into(), agent_id.into())
                .await
                .expect("assign backlog");
        }
    }

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "next one"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let ticket = relay.ticket(ticket_id.into_uuid()).await;
    assert_eq!(ticket.assigned_to, Some(agents[1].id));
}

#[tokio::test]
async fn test_load_balanced_without_backlog_stays_unassigned() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::LoadBalanced);
    let member = helpers::agent(session.client_id);
    relay.store.seed_team(team.clone()).await;
    relay.store.seed_user(member.clone()).await;
    relay.store.seed_member(team.id, member.id).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "first contact"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    assert_eq!(relay.ticket(ticket_id.into_uuid()).await.assigned_to, None);
}

#[tokio::test]
async fn test_ai_session_routes_to_the_bot_and_qa_pipeline() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, true).await;
    let bot = helpers::bot_agent(session.client_id);
    relay.store.seed_user(bot.clone()).await;
    let qa_log = relay.record_events(DOCUMENT_QA).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "What is your refund policy?"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let ticket = relay.ticket(ticket_id.into_uuid()).await;
    assert!(ticket.ai_enabled);
    assert_eq!(ticket.assigned_to, Some(bot.id));

    // The session now listens on the shared answers channel.
    let subs = relay
        .subscriptions()
        .get_subscriber_subscriptions(session.session_id, SubscriberKind::Session)
        .await
        .expect("list subscriptions");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].channel_name, DOCUMENT_QA_RESULTS);
    assert_eq!(subs[0].channel_kind, ChannelKind::QaResults);
    assert_eq!(subs[0].ticket_id, Some(ticket.id));

    let queries = qa_log.wait_for("query", 1).await;
    assert_eq!(queries[0].payload["query"], "What is your refund policy?");
    assert_eq!(queries[0].payload["id"], json!(ticket.id));
}

#[tokio::test]
async fn test_conversation_opens_with_welcome_then_first_message() {
    let relay = TestRelay::new().await;
    let mut session = helpers::contact_session(Uuid::new_v4(), Uuid::new_v4(), false);
    let widget = helpers::widget_with_welcome(session.client_id, "Welcome to Acme support!");
    session.widget_id = Some(widget.id);
    relay.store.seed_session(session.clone()).await;
    relay.store.seed_widget(widget).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "My order is late"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let rows = relay.messages(ticket_id.into_uuid()).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].sender_kind, SenderKind::Agent);
    assert_eq!(rows[0].body, "Welcome to Acme support!");
    assert_eq!(rows[1].sender_kind, SenderKind::User);
    assert_eq!(rows[1].body, "My order is late");
    assert_eq!(rows[1].session_id, Some(session.session_id));
}

#[tokio::test]
async fn test_welcome_falls_back_to_the_configured_default() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "hi"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let rows = relay.messages(ticket_id.into_uuid()).await;
    assert_eq!(rows[0].body, RelayConfig::default().default_welcome_message);
}

#[tokio::test]
async fn test_ai_welcome_is_attributed_to_the_bot() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, true).await;
    let bot = helpers::bot_agent(session.client_id);
    relay.store.seed_user(bot.clone()).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "hello bot"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let rows = relay.messages(ticket_id.into_uuid()).await;
    assert_eq!(rows[0].sender_kind, SenderKind::Bot);
    assert_eq!(rows[0].sender_id, Some(bot.id));
}

#[tokio::test]
async fn test_announces_the_ticket_on_the_contact_channel() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let contact =
        ChannelName::ContactEvent(SessionId::from_uuid(session.session_id)).to_string();
    let log = relay.record_events(&contact).await;

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "hey"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let replies = log.wait_for("new_ticket_reply", 1).await;
    assert_eq!(replies[0].payload["ticketId"], json!(ticket_id.into_uuid()));
    assert_eq!(replies[0].payload["sessionId"], json!(session.session_id));
}

#[tokio::test]
async fn test_unassigned_ticket_notifies_routable_team_members() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::Manual);
    relay.store.seed_team(team.clone()).await;
    let agents = helpers::sorted_agents(session.client_id, 2);
    let bot = helpers::bot_agent(session.client_id);
    for member in agents.iter().chain([&bot]) {
        relay.store.seed_user(member.clone()).await;
        relay.store.seed_member(team.id, member.id).await;
    }

    let ticket_id = relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "checkout is broken"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let notifications = relay.wait_for_notifications(1).await;
    let (notification, recipients) = &notifications[0];
    assert_eq!(notification.kind, "new_ticket");
    assert_eq!(notification.entity_id, Some(ticket_id.into_uuid()));
    assert_eq!(notification.payload["message"], "checkout is broken");

    // Bot members do not receive agent notifications.
    let mut got = recipients.clone();
    got.sort();
    let mut want = vec![agents[0].id, agents[1].id];
    want.sort();
    assert_eq!(got, want);
}

#[tokio::test]
async fn test_assigned_ticket_notifies_only_the_assignee() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let team = helpers::chat_team(session.workspace_id, RoutingStrategy::RoundRobin);
    relay.store.seed_team(team.clone()).await;
    let agents = helpers::sorted_agents(session.client_id, 2);
    for member in &agents {
        relay.store.seed_user(member.clone()).await;
        relay.store.seed_member(team.id, member.id).await;
    }

    relay
        .intake()
        .handle_new_ticket(
            helpers::new_ticket_request(&session, "password reset loop"),
            relay.subscriptions(),
        )
        .await
        .expect("intake");

    let notifications = relay.wait_for_notifications(1).await;
    let (notification, recipients) = &notifications[0];
    assert_eq!(notification.kind, "new_ticket");
    assert_eq!(recipients.as_slice(), &[agents[0].id]);
}

#[tokio::test]
async fn test_new_ticket_event_drives_intake_end_to_end() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;

    let session_channel =
        ChannelName::WidgetSession(SessionId::from_uuid(session.session_id)).to_string();
    let spec = NewSubscription::new(
        &session_channel,
        ChannelKind::WidgetSession,
        session.session_id,
        SubscriberKind::Session,
    )
    .with_session(session.session_id)
    .with_workspace(session.workspace_id);
    relay.subscribe(spec).await;

    let contact =
        ChannelName::ContactEvent(SessionId::from_uuid(session.session_id)).to_string();
    let log = relay.record_events(&contact).await;

    relay
        .publish(
            &session_channel,
            "new_ticket",
            json!({ "text": "Hi, my login is broken" }),
        )
        .await;

    let replies = log.wait_for("new_ticket_reply", 1).await;
    let ticket_id: Uuid =
        serde_json::from_value(replies[0].payload["ticketId"].clone()).expect("ticket id");
    let ticket = relay.ticket(ticket_id).await;
    assert_eq!(ticket.session_id, Some(session.session_id));

    let rows = relay.wait_for_messages(ticket_id, 2).await;
    assert_eq!(rows[1].body, "Hi, my login is broken");
}

#[tokio::test]
async fn test_new_ticket_event_without_text_is_ignored() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;

    let session_channel =
        ChannelName::WidgetSession(SessionId::from_uuid(session.session_id)).to_string();
    let spec = NewSubscription::new(
        &session_channel,
        ChannelKind::WidgetSession,
        session.session_id,
        SubscriberKind::Session,
    )
    .with_session(session.session_id);
    relay.subscribe(spec).await;

    let contact =
        ChannelName::ContactEvent(SessionId::from_uuid(session.session_id)).to_string();
    let log = relay.record_events(&contact).await;

    relay.publish(&session_channel, "new_ticket", json!({})).await;
    relay.settle().await;

    assert!(log.named("new_ticket_reply").await.is_empty());
}
