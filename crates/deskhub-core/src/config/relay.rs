//! Conversation relay engine configuration.

use serde::{Deserialize, Serialize};

/// Relay engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Whether to replay persisted active subscriptions on startup.
    #[serde(default = "default_true")]
    pub replay_on_start: bool,
    /// Interval between maintenance passes (inactive-subscription cleanup
    /// and stats logging), in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Welcome message used when a widget theme does not configure one.
    #[serde(default = "default_welcome_message")]
    pub default_welcome_message: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            replay_on_start: true,
            cleanup_interval_seconds: default_cleanup_interval(),
            default_welcome_message: default_welcome_message(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_welcome_message() -> String {
    "Hi! How can we help you today?".to_string()
}
