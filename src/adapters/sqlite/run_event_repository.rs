//! SQLite implementation of the RunEventRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EventLevel, RunEvent};
use crate::domain::ports::RunEventRepository;

#[derive(Clone)]
pub struct SqliteRunEventRepository {
    pool: SqlitePool,
}

impl SqliteRunEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunEventRepository for SqliteRunEventRepository {
    async fn append(&self, event: &RunEvent) -> DomainResult<()> {
        let payload = serde_json::to_string(&event.payload)?;

        sqlx::query(
            "INSERT INTO run_events (id, run_id, level, message, payload, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.run_id.to_string())
        .bind(event.level.as_str())
        .bind(&event.message)
        .bind(payload)
        .bind(format_datetime(event.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_run(&self, run_id: Uuid, limit: Option<u32>) -> DomainResult<Vec<RunEvent>> {
        // Newest `limit` events, returned oldest first.
        let rows: Vec<RunEventRow> = sqlx::query_as(
            "SELECT id, run_id, level, message, payload, created_at FROM (
                 SELECT id, run_id, level, message, payload, created_at, rowid AS seq FROM run_events
                 WHERE run_id = ?
                 ORDER BY seq DESC
                 LIMIT ?
             ) ORDER BY seq ASC",
        )
        .bind(run_id.to_string())
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RunEvent::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct RunEventRow {
    id: String,
    run_id: String,
    level: String,
    message: String,
    payload: String,
    created_at: String,
}

impl TryFrom<RunEventRow> for RunEvent {
    type Error = DomainError;

    fn try_from(row: RunEventRow) -> Result<Self, Self::Error> {
        let level = EventLevel::from_str(&row.level)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid level: {}", row.level)))?;

        Ok(RunEvent {
            id: parse_uuid(&row.id)?,
            run_id: parse_uuid(&row.run_id)?,
            level,
            message: row.message,
            payload: serde_json::from_str(&row.payload)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
