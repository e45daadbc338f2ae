//! Subscription lifecycle manager.
//!
//! Owns both the persistent subscription rows and the in-memory channel
//! registry; no other component writes either. Persistence failures
//! propagate to the caller. Transport wiring failures are logged and
//! swallowed: a missed live subscription is recoverable on the next
//! replay, while a lost record of intent is not.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::{ChatbotProfileId, SubscriptionId, TicketId};
use deskhub_entity::chatbot::ChatbotProfile;
use deskhub_entity::subscription::{
    ChannelKind, NewSubscription, SubscriberKind, SubscriptionKey, SubscriptionPatch,
    SubscriptionRecord,
};

use crate::channel::registry::{ActiveChannel, ChannelRegistry};
use crate::store::{ChatbotProfileStore, SubscriptionStore, TicketStore};
use crate::transport::PubSubTransport;

use super::ChannelWiring;

/// Outcome of replaying persisted subscriptions on startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Rows whose live listeners were re-established.
    pub restored: usize,
    /// Rows skipped because a referenced ticket or profile is gone.
    pub skipped: usize,
    /// Rows whose wiring failed for any other reason.
    pub failed: usize,
}

/// Health snapshot of the subscription system.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubscriptionStats {
    /// Active persisted rows grouped by channel kind.
    pub active_by_kind: Vec<(ChannelKind, i64)>,
    /// Live entries currently held in the in-memory registry.
    pub registry_entries: usize,
}

/// Manages the full lifecycle of channel subscriptions.
pub struct SubscriptionManager {
    store: Arc<dyn SubscriptionStore>,
    tickets: Arc<dyn TicketStore>,
    profiles: Arc<dyn ChatbotProfileStore>,
    transport: Arc<dyn PubSubTransport>,
    wiring: Arc<dyn ChannelWiring>,
    registry: ChannelRegistry,
}

impl SubscriptionManager {
    /// Create a manager with an empty registry.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        tickets: Arc<dyn TicketStore>,
        profiles: Arc<dyn ChatbotProfileStore>,
        transport: Arc<dyn PubSubTransport>,
        wiring: Arc<dyn ChannelWiring>,
    ) -> Self {
        Self {
            store,
            tickets,
            profiles,
            transport,
            wiring,
            registry: ChannelRegistry::new(),
        }
    }

    /// Replay every active persisted subscription into live listeners.
    ///
    /// Called once on startup. Rows referencing a deleted ticket or
    /// chatbot profile are skipped with a warning; any other per-row
    /// failure is logged and does not abort the remaining replay.
    pub async fn initialize_from_store(self: &Arc<Self>) -> AppResult<ReplayStats> {
        let records = self.store.list_active().await?;
        let mut stats = ReplayStats::default();

        for record in records {
            match self.replay_references_exist(&record).await {
                Ok(true) => {}
                Ok(false) => {
                    stats.skipped += 1;
                    continue;
                }
                Err(error) => {
                    warn!(
                        subscription_id = %record.id,
                        channel = %record.channel_name,
                        %error,
                        "reference check failed, skipping"
                    );
                    stats.failed += 1;
                    continue;
                }
            }
            match self.establish_subscription(&record).await {
                Ok(()) => stats.restored += 1,
                Err(error) => {
                    warn!(
                        subscription_id = %record.id,
                        channel = %record.channel_name,
                        %error,
                        "failed to re-establish subscription, skipping"
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(
            restored = stats.restored,
            skipped = stats.skipped,
            failed = stats.failed,
            "subscription replay complete"
        );
        Ok(stats)
    }

    /// Whether the rows a persisted subscription points at still exist.
    async fn replay_references_exist(&self, record: &SubscriptionRecord) -> AppResult<bool> {
        if let Some(ticket_id) = record.ticket_id {
            if self
                .tickets
                .find_by_id(TicketId::from_uuid(ticket_id))
                .await?
                .is_none()
            {
                warn!(
                    subscription_id = %record.id,
                    ticket_id = %ticket_id,
                    "subscription references a deleted ticket, skipping"
                );
                return Ok(false);
            }
        }
        if record.channel_kind == ChannelKind::Chatbot {
            let Some(profile_id) = record.chatbot_profile_id else {
                warn!(
                    subscription_id = %record.id,
                    "chatbot subscription without a profile id, skipping"
                );
                return Ok(false);
            };
            if self
                .profiles
                .find_by_id(ChatbotProfileId::from_uuid(profile_id))
                .await?
                .is_none()
            {
                warn!(
                    subscription_id = %record.id,
                    profile_id = %profile_id,
                    "subscription references a deleted chatbot profile, skipping"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Request a subscription, reusing and reactivating any existing row
    /// for the same `(channel, subscriber)` key.
    ///
    /// Returns the persisted record even when live wiring failed; the
    /// stored intent is repaired by the next replay.
    pub async fn add_subscription(
        self: &Arc<Self>,
        spec: NewSubscription,
    ) -> AppResult<SubscriptionRecord> {
        let key = spec.key();

        if let Some(existing) = self.store.find_latest_by_key(&key).await? {
            return self.reactivate_existing(existing, spec).await;
        }

        let record = match self.store.insert(&spec).await {
            Ok(record) => record,
            Err(error) if error.kind == ErrorKind::Conflict => {
                // Lost a concurrent insert race; adopt the winning row.
                match self.store.find_latest_by_key(&key).await? {
                    Some(existing) => return self.reactivate_existing(existing, spec).await,
                    None => return Err(error),
                }
            }
            Err(error) => return Err(error),
        };

        if let Err(error) = self.establish_subscription(&record).await {
            warn!(
                subscription_id = %record.id,
                channel = %record.channel_name,
                %error,
                "subscription persisted but wiring failed"
            );
        }
        debug!(
            subscription_id = %record.id,
            channel = %record.channel_name,
            subscriber = %record.subscriber_id,
            "subscription added"
        );
        Ok(record)
    }

    /// Reactivate an existing row for `spec`'s key, merging metadata and
    /// rewiring live listeners only when the routing context changed.
    async fn reactivate_existing(
        self: &Arc<Self>,
        existing: SubscriptionRecord,
        spec: NewSubscription,
    ) -> AppResult<SubscriptionRecord> {
        let key = existing.key();
        let needs_rewire = existing.context_differs(&spec);
        let patch = SubscriptionPatch::from_spec(&existing, &spec);
        let updated = self
            .store
            .reactivate(SubscriptionId::from_uuid(existing.id), &patch)
            .await?;

        if needs_rewire {
            // Listener closures captured the old ticket context.
            if let Some(entry) = self.registry.remove(&key) {
                entry.listeners.unsubscribe_all();
                debug!(
                    subscription_id = %updated.id,
                    channel = %updated.channel_name,
                    "context changed, rewiring listeners"
                );
            }
        }

        if !self.registry.contains(&key) {
            if let Err(error) = self.establish_subscription(&updated).await {
                warn!(
                    subscription_id = %updated.id,
                    channel = %updated.channel_name,
                    %error,
                    "subscription reactivated but wiring failed"
                );
            }
        }
        Ok(updated)
    }

    /// Wire live listeners for a record. Idempotent: a key already present
    /// in the registry is left untouched.
    pub async fn establish_subscription(
        self: &Arc<Self>,
        record: &SubscriptionRecord,
    ) -> AppResult<()> {
        let key = record.key();
        if self.registry.contains(&key) {
            return Ok(());
        }

        let profile = self.resolve_profile(record).await?;
        let channel = self.transport.channel(&record.channel_name);
        let listeners = self
            .wiring
            .wire(Arc::clone(&channel), record, profile.as_ref(), self)
            .await?;

        let replaced = self.registry.insert(
            key,
            ActiveChannel {
                channel,
                listeners,
                record: record.clone(),
            },
        );
        if let Some(previous) = replaced {
            // Concurrent establish for the same key; keep the newer wiring.
            previous.listeners.unsubscribe_all();
        }
        Ok(())
    }

    /// Resolve the chatbot profile a `chatbot` subscription persists under.
    async fn resolve_profile(
        &self,
        record: &SubscriptionRecord,
    ) -> AppResult<Option<ChatbotProfile>> {
        if record.channel_kind != ChannelKind::Chatbot {
            return Ok(None);
        }
        let Some(profile_id) = record.chatbot_profile_id else {
            return Err(AppError::validation(format!(
                "chatbot subscription {} has no profile id",
                record.id
            )));
        };
        match self
            .profiles
            .find_by_id(ChatbotProfileId::from_uuid(profile_id))
            .await?
        {
            Some(profile) => Ok(Some(profile)),
            None => Err(AppError::not_found(format!(
                "chatbot profile {profile_id} not found"
            ))),
        }
    }

    /// Soft-deactivate one subscription and detach its live listeners.
    /// Not finding an active record is a no-op, not an error.
    pub async fn remove_subscription(
        &self,
        channel_name: &str,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
    ) -> AppResult<()> {
        let key = SubscriptionKey::new(channel_name.to_string(), subscriber_id, subscriber_kind);

        if let Some(record) = self.store.find_active_by_key(&key).await? {
            self.store
                .deactivate(SubscriptionId::from_uuid(record.id))
                .await?;
            debug!(
                subscription_id = %record.id,
                channel = channel_name,
                "subscription deactivated"
            );
        }

        if let Some(entry) = self.registry.remove(&key) {
            entry.listeners.unsubscribe_all();
        }
        Ok(())
    }

    /// Deactivate all of a subscriber's subscriptions, optionally keeping
    /// the one tied to `exclude_ticket`. Returns the number deactivated.
    ///
    /// A subscriber with zero active rows is already clean; the call
    /// returns without touching the transport.
    pub async fn remove_subscriber_subscriptions(
        &self,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
        exclude_ticket: Option<TicketId>,
    ) -> AppResult<usize> {
        let current = self
            .store
            .list_active_by_subscriber(subscriber_id, subscriber_kind)
            .await?;
        if current.is_empty() {
            return Ok(0);
        }

        let deactivated = self
            .store
            .deactivate_for_subscriber(subscriber_id, subscriber_kind, exclude_ticket)
            .await?;
        for record in &deactivated {
            if let Some(entry) = self.registry.remove(&record.key()) {
                entry.listeners.unsubscribe_all();
            }
        }
        debug!(
            subscriber = %subscriber_id,
            kind = %subscriber_kind,
            deactivated = deactivated.len(),
            "subscriber subscriptions removed"
        );
        Ok(deactivated.len())
    }

    /// Active subscriptions on one channel.
    pub async fn get_channel_subscriptions(
        &self,
        channel_name: &str,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        self.store.list_active_by_channel(channel_name).await
    }

    /// Active subscriptions held by one subscriber.
    pub async fn get_subscriber_subscriptions(
        &self,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        self.store
            .list_active_by_subscriber(subscriber_id, subscriber_kind)
            .await
    }

    /// Active subscriptions referencing one ticket.
    pub async fn get_ticket_subscriptions(
        &self,
        ticket_id: TicketId,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        self.store.list_active_by_ticket(ticket_id).await
    }

    /// Bump a subscription's last-activity timestamp. Best-effort:
    /// failures are logged, never returned.
    pub async fn update_activity(
        &self,
        channel_name: &str,
        subscriber_id: Uuid,
        subscriber_kind: SubscriberKind,
    ) {
        let key = SubscriptionKey::new(channel_name.to_string(), subscriber_id, subscriber_kind);
        let result = async {
            if let Some(record) = self.store.find_active_by_key(&key).await? {
                self.store
                    .touch_activity(SubscriptionId::from_uuid(record.id))
                    .await?;
            }
            AppResult::Ok(())
        }
        .await;
        if let Err(error) = result {
            debug!(channel = channel_name, %error, "activity touch failed");
        }
    }

    /// Evict lingering registry entries whose persisted row is inactive.
    ///
    /// A correctness backstop, not the primary removal path. Returns the
    /// number of entries evicted.
    pub async fn cleanup_inactive_subscriptions(&self) -> AppResult<usize> {
        let stale = self.store.list_stale_inactive(Utc::now()).await?;
        let mut evicted = 0;
        for record in stale {
            let key = record.key();
            // The key may have been re-established under a newer active
            // row; only evict the entry this exact row created.
            let matches = self
                .registry
                .record(&key)
                .is_some_and(|live| live.id == record.id);
            if matches {
                if let Some(entry) = self.registry.remove(&key) {
                    entry.listeners.unsubscribe_all();
                    evicted += 1;
                }
            }
        }
        if evicted > 0 {
            info!(evicted, "cleaned up lingering inactive subscriptions");
        }
        Ok(evicted)
    }

    /// Active-row counts by channel kind plus the live registry size.
    pub async fn get_stats(&self) -> AppResult<SubscriptionStats> {
        let active_by_kind = self.store.count_active_by_kind().await?;
        Ok(SubscriptionStats {
            active_by_kind,
            registry_entries: self.registry.len(),
        })
    }

    /// Detach every live listener and clear the registry. Persisted rows
    /// are left untouched so the next startup replays them.
    pub fn evict_all(&self) {
        for key in self.registry.keys() {
            if let Some(entry) = self.registry.remove(&key) {
                entry.listeners.unsubscribe_all();
            }
        }
        info!("channel registry evicted");
    }

    /// Number of live registry entries.
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// Whether a live registry entry exists for the key.
    pub fn is_established(&self, key: &SubscriptionKey) -> bool {
        self.registry.contains(key)
    }
}
