//! DeskHub Relay: realtime conversation routing for multi-tenant
//! customer support.
//!
//! Main entry point that wires the database, stores, transport, and the
//! relay engine together.

use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use deskhub_core::config::AppConfig;
use deskhub_core::error::AppError;
use deskhub_database::repositories::{
    ChatbotProfileRepository, ConversationRepository, NotificationRepository, SessionRepository,
    SubscriptionRepository, TeamRepository, TicketRepository, UserRepository, WidgetRepository,
};
use deskhub_relay::engine::{RelayEngine, RelayStores};
use deskhub_relay::notify::NotificationFanout;
use deskhub_relay::transport::{MemoryTransport, PubSubTransport};

#[tokio::main]
async fn main() {
    let env = std::env::var("DESKHUB_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Relay error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main relay run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting DeskHub relay v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db = deskhub_database::DatabasePool::connect(&config.database).await?;
    deskhub_database::migration::run_migrations(db.pool()).await?;

    // ── Step 2: Store implementations ────────────────────────────
    let pool = db.pool().clone();
    let stores = RelayStores {
        subscriptions: Arc::new(SubscriptionRepository::new(pool.clone())),
        tickets: Arc::new(TicketRepository::new(pool.clone())),
        conversations: Arc::new(ConversationRepository::new(pool.clone())),
        users: Arc::new(UserRepository::new(pool.clone())),
        teams: Arc::new(TeamRepository::new(pool.clone())),
        sessions: Arc::new(SessionRepository::new(pool.clone())),
        profiles: Arc::new(ChatbotProfileRepository::new(pool.clone())),
        widgets: Arc::new(WidgetRepository::new(pool.clone())),
        notifications: Arc::new(NotificationRepository::new(pool)),
    };

    // ── Step 3: Transport, chatbot gateway, notifier ─────────────
    let transport: Arc<dyn PubSubTransport> = Arc::new(MemoryTransport::new());
    let gateway = Arc::new(deskhub_chatbot::HttpChatbotClient::new(
        config.chatbot.clone(),
    )?);
    let notifier = Arc::new(NotificationFanout::new(
        Arc::clone(&stores.notifications),
        Arc::clone(&transport),
    ));

    // ── Step 4: Relay engine assembly ────────────────────────────
    let engine = Arc::new(RelayEngine::build(
        stores,
        Arc::clone(&transport),
        gateway,
        notifier,
        config.relay.clone(),
    ));

    // ── Step 5: Replay persisted subscriptions ───────────────────
    let replay = engine.initialize().await?;
    tracing::info!(
        restored = replay.restored,
        skipped = replay.skipped,
        failed = replay.failed,
        "subscription replay complete"
    );

    // ── Step 6: Start maintenance loop ───────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine.run_maintenance(shutdown_rx).await;
        })
    };

    tracing::info!("DeskHub relay running");

    // ── Step 7: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping relay...");
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), maintenance).await;
    engine.shutdown();
    db.close().await;

    tracing::info!("DeskHub relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
