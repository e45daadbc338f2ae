//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use deskhub_core::error::{AppError, ErrorKind};

/// Run all pending database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("running database migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("database migrations up to date");
    Ok(())
}
