//! Widget repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::WidgetId;
use deskhub_entity::widget::Widget;
use deskhub_relay::store::WidgetStore;

/// Repository over the `widgets` table.
#[derive(Debug, Clone)]
pub struct WidgetRepository {
    pool: PgPool,
}

impl WidgetRepository {
    /// Create a new widget repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WidgetStore for WidgetRepository {
    async fn find_by_id(&self, id: WidgetId) -> AppResult<Option<Widget>> {
        sqlx::query_as::<_, Widget>(
            "SELECT * FROM widgets WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to find widget", e))
    }
}
