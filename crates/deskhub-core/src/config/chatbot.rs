//! Chatbot gateway configuration.

use serde::{Deserialize, Serialize};

/// External chatbot/LLM service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotConfig {
    /// Base URL of the chatbot runtime, used when a profile does not
    /// configure its own webhook URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8085".to_string()
}

fn default_timeout() -> u64 {
    30
}
