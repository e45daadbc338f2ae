//! Chat widget entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An embeddable chat widget configuration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Widget {
    /// Unique widget identifier.
    pub id: Uuid,
    /// Owning client (tenant).
    pub client_id: Uuid,
    /// Widget display name.
    pub name: String,
    /// Theme configuration (JSON object), maintained by the dashboard.
    pub theme: serde_json::Value,
    /// When the widget was created.
    pub created_at: DateTime<Utc>,
    /// When the widget was last updated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Widget {
    /// The welcome message configured in the widget theme, if any.
    ///
    /// The dashboard stores theme keys in camelCase; older rows used
    /// snake_case, so both spellings are accepted.
    pub fn welcome_message(&self) -> Option<&str> {
        self.theme
            .get("welcomeMessage")
            .or_else(|| self.theme.get("welcome_message"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}
