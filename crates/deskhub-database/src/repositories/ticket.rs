//! Ticket repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_core::types::id::{TeamId, TicketId, UserId};
use deskhub_entity::ticket::{CreateTicket, Ticket};
use deskhub_relay::store::TicketStore;

/// Repository over the `tickets` table.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    /// Create a new ticket repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for TicketRepository {
    async fn insert(&self, ticket: &CreateTicket) -> AppResult<Ticket> {
        sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets \
             (subject, status, client_id, workspace_id, team_id, session_id, ai_enabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(&ticket.subject)
        .bind(ticket.status)
        .bind(ticket.client_id)
        .bind(ticket.workspace_id)
        .bind(ticket.team_id)
        .bind(ticket.session_id)
        .bind(ticket.ai_enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to insert ticket", e))
    }

    async fn find_by_id(&self, id: TicketId) -> AppResult<Option<Ticket>> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to find ticket", e))
    }

    async fn set_assignee(&self, id: TicketId, agent_id: UserId) -> AppResult<()> {
        sqlx::query("UPDATE tickets SET assigned_to = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.into_uuid())
            .bind(agent_id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "failed to assign ticket", e))?;
        Ok(())
    }

    async fn set_csat(&self, id: TicketId, rating: i16) -> AppResult<()> {
        sqlx::query("UPDATE tickets SET csat_rating = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.into_uuid())
            .bind(rating)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "failed to record csat rating", e)
            })?;
        Ok(())
    }

    async fn count_open_by_assignee(&self, team_id: TeamId) -> AppResult<Vec<(UserId, i64)>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT assigned_to, COUNT(*) FROM tickets \
             WHERE team_id = $1 AND assigned_to IS NOT NULL AND status IN ('open', 'pending') \
             GROUP BY assigned_to",
        )
        .bind(team_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to count open tickets", e)
        })?;

        Ok(rows
            .into_iter()
            .map(|(agent, count)| (UserId::from_uuid(agent), count))
            .collect())
    }

    async fn last_assigned_agent(&self, team_id: TeamId) -> AppResult<Option<UserId>> {
        let agent = sqlx::query_scalar::<_, Uuid>(
            "SELECT assigned_to FROM tickets \
             WHERE team_id = $1 AND assigned_to IS NOT NULL \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(team_id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "failed to find last assigned agent", e)
        })?;

        Ok(agent.map(UserId::from_uuid))
    }
}
