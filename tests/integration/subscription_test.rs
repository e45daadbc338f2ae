//! Subscription lifecycle tests: persistence, registry wiring,
//! row reuse, and startup replay.

use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

use deskhub_core::AppResult;
use deskhub_core::error::AppError;
use deskhub_core::types::id::{ChatbotProfileId, SubscriptionId, TeamId, TicketId, UserId};
use deskhub_entity::subscription::{ChannelKind, NewSubscription, SubscriberKind, SubscriptionKey};
use deskhub_entity::ticket::{CreateTicket, Ticket};
use deskhub_relay::ChannelName;
use deskhub_relay::store::{MemoryStore, SubscriptionStore, TicketStore};
use deskhub_relay::subscription::ReplayStats;

use super::helpers::{self, TestRelay};

fn ticket_spec(ticket_id: Uuid, agent_id: Uuid) -> NewSubscription {
    let channel = ChannelName::Ticket(TicketId::from_uuid(ticket_id)).to_string();
    NewSubscription::new(channel, ChannelKind::Ticket, agent_id, SubscriberKind::Agent)
        .with_ticket(ticket_id)
}

#[tokio::test]
async fn test_add_subscription_persists_and_wires() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;

    let spec = ticket_spec(ticket.id, Uuid::new_v4());
    let record = relay.subscribe(spec.clone()).await;

    assert!(record.is_active);
    assert_eq!(record.channel_name, spec.channel_name);
    assert_eq!(record.ticket_id, Some(ticket.id));
    assert!(relay.subscriptions().is_established(&spec.key()));
    assert_eq!(relay.subscriptions().registry_len(), 1);
    assert_eq!(relay.store.subscription_rows().await.len(), 1);
}

#[tokio::test]
async fn test_adding_the_same_subscription_twice_reuses_the_row() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;

    let spec = ticket_spec(ticket.id, Uuid::new_v4());
    let first = relay.subscribe(spec.clone()).await;
    let second = relay.subscribe(spec).await;

    assert_eq!(first.id, second.id);
    assert!(second.is_active);
    assert_eq!(relay.store.subscription_rows().await.len(), 1);
    assert_eq!(relay.subscriptions().registry_len(), 1);
}

#[tokio::test]
async fn test_readding_after_removal_reactivates_the_same_row() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;
    let agent_id = Uuid::new_v4();

    let spec = ticket_spec(ticket.id, agent_id);
    let record = relay.subscribe(spec.clone()).await;

    relay
        .subscriptions()
        .remove_subscription(&spec.channel_name, agent_id, SubscriberKind::Agent)
        .await
        .expect("remove");
    assert_eq!(relay.subscriptions().registry_len(), 0);
    let rows = relay.store.subscription_rows().await;
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_active);

    let revived = relay.subscribe(spec).await;
    assert_eq!(revived.id, record.id);
    assert!(revived.is_active);
    assert_eq!(relay.store.subscription_rows().await.len(), 1);
    assert!(relay.subscriptions().is_established(&revived.key()));
}

#[tokio::test]
async fn test_reactivation_merges_metadata() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;
    let agent_id = Uuid::new_v4();

    let spec = ticket_spec(ticket.id, agent_id)
        .with_metadata(json!({ "origin": "widget", "revision": 1 }));
    relay.subscribe(spec.clone()).await;
    relay
        .subscriptions()
        .remove_subscription(&spec.channel_name, agent_id, SubscriberKind::Agent)
        .await
        .expect("remove");

    let revived = relay
        .subscribe(
            ticket_spec(ticket.id, agent_id)
                .with_metadata(json!({ "revision": 2, "locale": "en" })),
        )
        .await;

    assert_eq!(
        revived.metadata,
        json!({ "origin": "widget", "revision": 2, "locale": "en" })
    );
}

#[tokio::test]
async fn test_removing_an_unknown_subscription_is_a_noop() {
    let relay = TestRelay::new().await;

    relay
        .subscriptions()
        .remove_subscription("ticket:unknown", Uuid::new_v4(), SubscriberKind::Agent)
        .await
        .expect("remove must not fail");

    assert_eq!(relay.subscriptions().registry_len(), 0);
}

#[tokio::test]
async fn test_subscriber_switch_keeps_only_the_excluded_ticket() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let first = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;
    let second = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;

    for ticket in [&first, &second] {
        let channel = ChannelName::WidgetConversation(TicketId::from_uuid(ticket.id)).to_string();
        let spec = NewSubscription::new(
            channel,
            ChannelKind::Conversation,
            session.session_id,
            SubscriberKind::Session,
        )
        .with_ticket(ticket.id)
        .with_session(session.session_id);
        relay.subscribe(spec).await;
    }
    assert_eq!(relay.subscriptions().registry_len(), 2);

    let dropped = relay
        .subscriptions()
        .remove_subscriber_subscriptions(
            session.session_id,
            SubscriberKind::Session,
            Some(TicketId::from_uuid(second.id)),
        )
        .await
        .expect("switch");

    assert_eq!(dropped, 1);
    assert_eq!(relay.subscriptions().registry_len(), 1);
    let remaining = relay
        .subscriptions()
        .get_subscriber_subscriptions(session.session_id, SubscriberKind::Session)
        .await
        .expect("list remaining");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].ticket_id, Some(second.id));
}

#[tokio::test]
async fn test_replay_restores_rows_and_skips_dangling_references() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;

    let ticket_channel = ChannelName::Ticket(TicketId::from_uuid(ticket.id)).to_string();
    let mut agent_row = helpers::subscription_row(
        &ticket_channel,
        ChannelKind::Ticket,
        Uuid::new_v4(),
        SubscriberKind::Agent,
    );
    agent_row.ticket_id = Some(ticket.id);
    relay.store.seed_subscription(agent_row).await;

    let conversation_channel =
        ChannelName::WidgetConversation(TicketId::from_uuid(ticket.id)).to_string();
    let mut session_row = helpers::subscription_row(
        &conversation_channel,
        ChannelKind::Conversation,
        session.session_id,
        SubscriberKind::Session,
    );
    session_row.ticket_id = Some(ticket.id);
    session_row.session_id = Some(session.session_id);
    relay.store.seed_subscription(session_row).await;

    // References a ticket that no longer exists.
    let gone = Uuid::new_v4();
    let mut dangling_ticket = helpers::subscription_row(
        &ChannelName::Ticket(TicketId::from_uuid(gone)).to_string(),
        ChannelKind::Ticket,
        Uuid::new_v4(),
        SubscriberKind::Agent,
    );
    dangling_ticket.ticket_id = Some(gone);
    relay.store.seed_subscription(dangling_ticket).await;

    // Chatbot row whose profile was deleted.
    let missing_profile = Uuid::new_v4();
    let bot_channel = ChannelName::Chatbot {
        profile_id: ChatbotProfileId::from_uuid(missing_profile),
        ticket_id: TicketId::from_uuid(ticket.id),
    }
    .to_string();
    let mut dangling_bot = helpers::subscription_row(
        &bot_channel,
        ChannelKind::Chatbot,
        session.session_id,
        SubscriberKind::Session,
    );
    dangling_bot.ticket_id = Some(ticket.id);
    dangling_bot.chatbot_profile_id = Some(missing_profile);
    relay.store.seed_subscription(dangling_bot).await;

    let stats = relay.engine.initialize().await.expect("replay");

    assert_eq!(
        stats,
        ReplayStats {
            restored: 2,
            skipped: 2,
            failed: 0
        }
    );
    assert_eq!(relay.subscriptions().registry_len(), 2);
}

#[tokio::test]
async fn test_replay_counts_unwireable_rows_as_failed() {
    let relay = TestRelay::new().await;

    // Conversation row carrying no ticket context at all.
    let row = helpers::subscription_row(
        "widget:conversation:unscoped",
        ChannelKind::Conversation,
        Uuid::new_v4(),
        SubscriberKind::Session,
    );
    relay.store.seed_subscription(row).await;

    let stats = relay.engine.initialize().await.expect("replay");

    assert_eq!(
        stats,
        ReplayStats {
            restored: 0,
            skipped: 0,
            failed: 1
        }
    );
    assert_eq!(relay.subscriptions().registry_len(), 0);
}

/// Ticket lookups error for one poisoned id, the way a transient
/// database failure would during replay.
struct FlakyTicketLookup {
    inner: Arc<MemoryStore>,
    poisoned: Uuid,
}

#[async_trait]
impl TicketStore for FlakyTicketLookup {
    async fn insert(&self, ticket: &CreateTicket) -> AppResult<Ticket> {
        TicketStore::insert(&*self.inner, ticket).await
    }

    async fn find_by_id(&self, id: TicketId) -> AppResult<Option<Ticket>> {
        if id.into_uuid() == self.poisoned {
            return Err(AppError::database("connection reset by peer"));
        }
        TicketStore::find_by_id(&*self.inner, id).await
    }

    async fn set_assignee(&self, id: TicketId, agent_id: UserId) -> AppResult<()> {
        TicketStore::set_assignee(&*self.inner, id, agent_id).await
    }

    async fn set_csat(&self, id: TicketId, rating: i16) -> AppResult<()> {
        TicketStore::set_csat(&*self.inner, id, rating).await
    }

    async fn count_open_by_assignee(&self, team_id: TeamId) -> AppResult<Vec<(UserId, i64)>> {
        TicketStore::count_open_by_assignee(&*self.inner, team_id).await
    }

    async fn last_assigned_agent(&self, team_id: TeamId) -> AppResult<Option<UserId>> {
        TicketStore::last_assigned_agent(&*self.inner, team_id).await
    }
}

#[tokio::test]
async fn test_replay_isolates_a_failing_reference_check() {
    let store = Arc::new(MemoryStore::new());
    let session = helpers::contact_session(Uuid::new_v4(), Uuid::new_v4(), false);
    store.seed_session(session.clone()).await;
    let broken = TicketStore::insert(&*store, &helpers::ticket_for_session(&session, None))
        .await
        .expect("seed broken ticket");
    let healthy = TicketStore::insert(&*store, &helpers::ticket_for_session(&session, None))
        .await
        .expect("seed healthy ticket");

    let tickets: Arc<dyn TicketStore> = Arc::new(FlakyTicketLookup {
        inner: Arc::clone(&store),
        poisoned: broken.id,
    });
    let relay = TestRelay::with_ticket_store(Arc::clone(&store), tickets).await;

    let healthy_agent = Uuid::new_v4();
    for (ticket, agent_id) in [(&broken, Uuid::new_v4()), (&healthy, healthy_agent)] {
        let channel = ChannelName::Ticket(TicketId::from_uuid(ticket.id)).to_string();
        let mut row =
            helpers::subscription_row(&channel, ChannelKind::Ticket, agent_id, SubscriberKind::Agent);
        row.ticket_id = Some(ticket.id);
        relay.store.seed_subscription(row).await;
    }

    let stats = relay.engine.initialize().await.expect("replay must not abort");

    assert_eq!(
        stats,
        ReplayStats {
            restored: 1,
            skipped: 0,
            failed: 1
        }
    );
    assert_eq!(relay.subscriptions().registry_len(), 1);
    let healthy_key = SubscriptionKey::new(
        ChannelName::Ticket(TicketId::from_uuid(healthy.id)).to_string(),
        healthy_agent,
        SubscriberKind::Agent,
    );
    assert!(relay.subscriptions().is_established(&healthy_key));
}

#[tokio::test]
async fn test_cleanup_evicts_registry_entries_for_inactive_rows() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;

    let record = relay.subscribe(ticket_spec(ticket.id, Uuid::new_v4())).await;

    // The row goes inactive without the manager seeing it.
    SubscriptionStore::deactivate(&*relay.store, SubscriptionId::from_uuid(record.id))
        .await
        .expect("deactivate");
    assert_eq!(relay.subscriptions().registry_len(), 1);

    let evicted = relay
        .subscriptions()
        .cleanup_inactive_subscriptions()
        .await
        .expect("cleanup");

    assert_eq!(evicted, 1);
    assert_eq!(relay.subscriptions().registry_len(), 0);
}

#[tokio::test]
async fn test_shutdown_clears_the_registry_but_keeps_rows() {
    let relay = TestRelay::new().await;
    let session = helpers::seed_session(&relay, false).await;
    let ticket = relay
        .seed_ticket(&helpers::ticket_for_session(&session, None))
        .await;
    relay.subscribe(ticket_spec(ticket.id, Uuid::new_v4())).await;

    relay.engine.shutdown();

    assert_eq!(relay.subscriptions().registry_len(), 0);
    let rows = relay.store.subscription_rows().await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_active);
}

#[derive(Debug, Clone)]
enum SubscriptionOp {
    Add(usize),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = SubscriptionOp> {
    prop_oneof![
        (0..3usize).prop_map(SubscriptionOp::Add),
        (0..3usize).prop_map(SubscriptionOp::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    /// Any interleaving of add and remove calls leaves at most one row
    /// per subscription key, and the registry mirrors the active rows.
    #[test]
    fn prop_one_row_per_key_across_add_remove_interleavings(
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async move {
            let relay = TestRelay::new().await;
            let session = helpers::seed_session(&relay, false).await;
            let mut tickets = Vec::new();
            for _ in 0..3 {
                tickets.push(
                    relay
                        .seed_ticket(&helpers::ticket_for_session(&session, None))
                        .await,
                );
            }
            let agent_id = Uuid::new_v4();

            for op in ops {
                match op {
                    SubscriptionOp::Add(i) => {
                        relay.subscribe(ticket_spec(tickets[i].id, agent_id)).await;
                    }
                    SubscriptionOp::Remove(i) => {
                        let channel =
                            ChannelName::Ticket(TicketId::from_uuid(tickets[i].id)).to_string();
                        relay
                            .subscriptions()
                            .remove_subscription(&channel, agent_id, SubscriberKind::Agent)
                            .await
                            .expect("remove");
                    }
                }
            }

            let rows = relay.store.subscription_rows().await;
            for ticket in &tickets {
                let channel = ChannelName::Ticket(TicketId::from_uuid(ticket.id)).to_string();
                let per_key = rows
                    .iter()
                    .filter(|r| r.channel_name == channel)
                    .count();
                assert!(per_key <= 1, "{per_key} rows for one key on {channel}");
            }
            let active = rows.iter().filter(|r| r.is_active).count();
            assert_eq!(relay.subscriptions().registry_len(), active);
        });
    }
}
