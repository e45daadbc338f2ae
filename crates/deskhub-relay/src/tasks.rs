//! Detached side-effect tasks.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::error;

use deskhub_core::result::AppResult;

/// Spawn a fire-and-forget task whose failure is logged under `task`.
///
/// Used for side effects that must not block or fail the triggering
/// event: webhook deliveries, notification fan-out, activity touches.
pub fn spawn_logged<F>(task: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = AppResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(error) = fut.await {
            error!(task, %error, "detached task failed");
        }
    })
}
