//! Relay engine assembly and lifecycle.
//!
//! [`RelayEngine::build`] wires the router, intake, dispatch, and
//! subscription manager over one set of stores, then drives the startup
//! replay, the periodic maintenance pass, and shutdown teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use deskhub_chatbot::ChatbotGateway;
use deskhub_core::config::RelayConfig;
use deskhub_core::result::AppResult;

use crate::dispatch::HandlerDispatch;
use crate::intake::TicketIntakeService;
use crate::notify::Notifier;
use crate::router::{ConversationRouter, MessageRouter};
use crate::store::{
    ChatbotProfileStore, ConversationStore, NotificationStore, SessionStore, SubscriptionStore,
    TeamStore, TicketStore, UserStore, WidgetStore,
};
use crate::subscription::{ReplayStats, SubscriptionManager};
use crate::transport::PubSubTransport;

/// The persistence ports the relay runs over.
///
/// One field per store trait; the engine wires each into the component
/// that needs it. Implementations are shared, so the same `Arc` may back
/// several fields' concerns in tests.
#[derive(Clone)]
pub struct RelayStores {
    /// Subscription intent records.
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Ticket rows and assignment.
    pub tickets: Arc<dyn TicketStore>,
    /// Conversation message rows.
    pub conversations: Arc<dyn ConversationStore>,
    /// Agent and bot user lookups.
    pub users: Arc<dyn UserStore>,
    /// Team and membership lookups.
    pub teams: Arc<dyn TeamStore>,
    /// Widget contact session context.
    pub sessions: Arc<dyn SessionStore>,
    /// Chatbot profile lookups.
    pub profiles: Arc<dyn ChatbotProfileStore>,
    /// Widget theme lookups.
    pub widgets: Arc<dyn WidgetStore>,
    /// Notification persistence.
    pub notifications: Arc<dyn NotificationStore>,
}

/// The assembled conversation relay.
pub struct RelayEngine {
    subscriptions: Arc<SubscriptionManager>,
    config: RelayConfig,
}

impl RelayEngine {
    /// Wire the full relay pipeline over the given stores and collaborators.
    pub fn build(
        stores: RelayStores,
        transport: Arc<dyn PubSubTransport>,
        gateway: Arc<dyn ChatbotGateway>,
        notifier: Arc<dyn Notifier>,
        config: RelayConfig,
    ) -> Self {
        let router: Arc<dyn MessageRouter> = Arc::new(ConversationRouter::new(
            Arc::clone(&stores.tickets),
            Arc::clone(&stores.conversations),
            Arc::clone(&stores.sessions),
            Arc::clone(&stores.users),
            Arc::clone(&stores.teams),
            Arc::clone(&transport),
            Arc::clone(&notifier),
        ));

        let intake = Arc::new(TicketIntakeService::new(
            Arc::clone(&stores.tickets),
            Arc::clone(&stores.conversations),
            Arc::clone(&stores.sessions),
            Arc::clone(&stores.users),
            Arc::clone(&stores.teams),
            Arc::clone(&stores.widgets),
            Arc::clone(&transport),
            Arc::clone(&notifier),
            config.clone(),
        ));

        let dispatch = Arc::new(HandlerDispatch::new(
            router,
            intake,
            Arc::clone(&stores.conversations),
            gateway,
            Arc::clone(&transport),
        ));

        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&stores.subscriptions),
            Arc::clone(&stores.tickets),
            Arc::clone(&stores.profiles),
            transport,
            dispatch,
        ));

        Self {
            subscriptions,
            config,
        }
    }

    /// The subscription manager driving this engine.
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Replay persisted active subscriptions into live listeners.
    ///
    /// Skipped (returning empty stats) when replay is disabled in
    /// configuration.
    pub async fn initialize(&self) -> AppResult<ReplayStats> {
        if !self.config.replay_on_start {
            info!("subscription replay disabled, starting with an empty registry");
            return Ok(ReplayStats::default());
        }
        self.subscriptions.initialize_from_store().await
    }

    /// Run the periodic maintenance pass until the cancel signal flips.
    ///
    /// Each pass evicts lingering handles for inactive subscription rows
    /// and logs the current stats. Pass failures are logged and the loop
    /// keeps running.
    pub async fn run_maintenance(&self, mut cancel: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.cleanup_interval_seconds);
        info!(interval_seconds = self.config.cleanup_interval_seconds, "relay maintenance started");

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(interval) => {
                    self.maintenance_pass().await;
                }
            }
        }

        info!("relay maintenance stopped");
    }

    async fn maintenance_pass(&self) {
        match self.subscriptions.cleanup_inactive_subscriptions().await {
            Ok(evicted) if evicted > 0 => {
                info!(evicted, "evicted lingering handles for inactive subscriptions");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "subscription cleanup pass failed");
            }
        }

        match self.subscriptions.get_stats().await {
            Ok(stats) => {
                debug!(
                    registry_entries = stats.registry_entries,
                    active_kinds = stats.active_by_kind.len(),
                    "subscription stats"
                );
            }
            Err(error) => {
                debug!(%error, "subscription stats query failed");
            }
        }
    }

    /// Detach every live listener. Persisted intent is left untouched so
    /// the next start can replay it.
    pub fn shutdown(&self) {
        self.subscriptions.evict_all();
        info!("relay engine shut down");
    }
}
