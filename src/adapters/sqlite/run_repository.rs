//! SQLite implementation of the RunRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, format_optional_datetime, parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ModeStrategy, Phase1Settings, Phase2Settings, Run, RunPhase, RunStatus};
use crate::domain::ports::{RunFilter, RunRepository};

const RUN_COLUMNS: &str = "id, owner_id, phase, status, steps_completed, target_steps, rounds_completed, rounds_target, \
     strategy, phase1_delay_secs, early_stop_enabled, auto_select_enabled, phase2_delay_secs, research_mode, \
     last_run_at, next_run_at, in_progress_until, last_error, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn create(&self, run: &Run) -> DomainResult<()> {
        sqlx::query(&format!(
            "INSERT INTO runs ({RUN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(run.id.to_string())
        .bind(&run.owner_id)
        .bind(run.phase.as_str())
        .bind(run.status.as_str())
        .bind(i64::from(run.steps_completed))
        .bind(i64::from(run.target_steps))
        .bind(i64::from(run.rounds_completed))
        .bind(i64::from(run.rounds_target))
        .bind(run.phase1.strategy.as_str())
        .bind(delay_column(run.phase1.delay_secs)?)
        .bind(run.phase1.early_stop_enabled)
        .bind(run.phase1.auto_select_enabled)
        .bind(delay_column(run.phase2.delay_secs)?)
        .bind(run.phase2.research_mode)
        .bind(format_optional_datetime(run.last_run_at))
        .bind(format_optional_datetime(run.next_run_at))
        .bind(format_optional_datetime(run.in_progress_until))
        .bind(&run.last_error)
        .bind(format_datetime(run.created_at))
        .bind(format_datetime(run.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Run>> {
        let row: Option<RunRow> = sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Run::try_from).transpose()
    }

    async fn get_owner(&self, id: Uuid) -> DomainResult<Option<String>> {
        let owner: Option<(String,)> = sqlx::query_as("SELECT owner_id FROM runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner.map(|(o,)| o))
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<Run>> {
        let rows: Vec<RunRow> = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM runs
             WHERE status = 'active' AND next_run_at IS NOT NULL AND next_run_at <= ?
               AND (in_progress_until IS NULL OR in_progress_until <= ?)
             ORDER BY next_run_at ASC, created_at ASC
             LIMIT ?"
        ))
        .bind(format_datetime(now))
        .bind(format_datetime(now))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Run::try_from).collect()
    }

    async fn try_acquire_lock(&self, id: Uuid, now: DateTime<Utc>, until: DateTime<Utc>) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE runs SET in_progress_until = ?, updated_at = ?
             WHERE id = ? AND status = 'active'
               AND (in_progress_until IS NULL OR in_progress_until <= ?)",
        )
        .bind(format_datetime(until))
        .bind(format_datetime(now))
        .bind(id.to_string())
        .bind(format_datetime(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, run: &Run) -> DomainResult<()> {
        if self.write(run, None).await? == 0 {
            return Err(DomainError::RunNotFound(run.id));
        }

        Ok(())
    }

    async fn update_under_lock(&self, run: &Run, lock_until: DateTime<Utc>) -> DomainResult<bool> {
        Ok(self.write(run, Some(lock_until)).await? == 1)
    }

    async fn fail_if_active(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'failed', in_progress_until = NULL, next_run_at = NULL,
               last_error = ?, updated_at = ?
             WHERE id = ? AND status = 'active'",
        )
        .bind(error)
        .bind(format_datetime(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: RunFilter) -> DomainResult<Vec<Run>> {
        let mut query = format!("SELECT {RUN_COLUMNS} FROM runs WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        if let Some(owner_id) = &filter.owner_id {
            query.push_str(" AND owner_id = ?");
            bindings.push(owner_id.clone());
        }

        query.push_str(" ORDER BY created_at DESC");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, RunRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<RunRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Run::try_from).collect()
    }
}

impl SqliteRunRepository {
    /// Full-row update. With `lock_until`, only applies while the run is
    /// active and still holds exactly that lock.
    async fn write(&self, run: &Run, lock_until: Option<DateTime<Utc>>) -> DomainResult<u64> {
        let guard = if lock_until.is_some() { " AND status = 'active' AND in_progress_until = ?" } else { "" };
        let sql = format!(
            "UPDATE runs SET phase = ?, status = ?, steps_completed = ?, target_steps = ?,
               rounds_completed = ?, rounds_target = ?, strategy = ?, phase1_delay_secs = ?,
               early_stop_enabled = ?, auto_select_enabled = ?, phase2_delay_secs = ?, research_mode = ?,
               last_run_at = ?, next_run_at = ?, in_progress_until = ?, last_error = ?, updated_at = ?
             WHERE id = ?{guard}"
        );

        let mut query = sqlx::query(&sql)
            .bind(run.phase.as_str())
            .bind(run.status.as_str())
            .bind(i64::from(run.steps_completed))
            .bind(i64::from(run.target_steps))
            .bind(i64::from(run.rounds_completed))
            .bind(i64::from(run.rounds_target))
            .bind(run.phase1.strategy.as_str())
            .bind(delay_column(run.phase1.delay_secs)?)
            .bind(run.phase1.early_stop_enabled)
            .bind(run.phase1.auto_select_enabled)
            .bind(delay_column(run.phase2.delay_secs)?)
            .bind(run.phase2.research_mode)
            .bind(format_optional_datetime(run.last_run_at))
            .bind(format_optional_datetime(run.next_run_at))
            .bind(format_optional_datetime(run.in_progress_until))
            .bind(&run.last_error)
            .bind(format_datetime(run.updated_at))
            .bind(run.id.to_string());
        if let Some(lock_until) = lock_until {
            query = query.bind(format_datetime(lock_until));
        }

        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

fn delay_column(secs: u64) -> DomainResult<i64> {
    i64::try_from(secs).map_err(|_| DomainError::ValidationFailed(format!("delay of {secs}s does not fit in storage")))
}

/// Narrow an INTEGER column, rejecting values a valid run can never hold.
fn from_column<T: TryFrom<i64>>(value: i64, column: &str) -> DomainResult<T> {
    T::try_from(value).map_err(|_| DomainError::SerializationError(format!("Invalid {column}: {value}")))
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    owner_id: String,
    phase: String,
    status: String,
    steps_completed: i64,
    target_steps: i64,
    rounds_completed: i64,
    rounds_target: i64,
    strategy: String,
    phase1_delay_secs: i64,
    early_stop_enabled: bool,
    auto_select_enabled: bool,
    phase2_delay_secs: i64,
    research_mode: bool,
    last_run_at: Option<String>,
    next_run_at: Option<String>,
    in_progress_until: Option<String>,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RunRow> for Run {
    type Error = DomainError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let phase = RunPhase::from_str(&row.phase)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid phase: {}", row.phase)))?;
        let status = RunStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;
        let strategy = ModeStrategy::from_str(&row.strategy)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid strategy: {}", row.strategy)))?;

        Ok(Run {
            id: parse_uuid(&row.id)?,
            owner_id: row.owner_id,
            phase,
            status,
            steps_completed: from_column(row.steps_completed, "steps_completed")?,
            target_steps: from_column(row.target_steps, "target_steps")?,
            rounds_completed: from_column(row.rounds_completed, "rounds_completed")?,
            rounds_target: from_column(row.rounds_target, "rounds_target")?,
            phase1: Phase1Settings {
                delay_secs: from_column(row.phase1_delay_secs, "phase1_delay_secs")?,
                early_stop_enabled: row.early_stop_enabled,
                strategy,
                auto_select_enabled: row.auto_select_enabled,
            },
            phase2: Phase2Settings {
                delay_secs: from_column(row.phase2_delay_secs, "phase2_delay_secs")?,
                research_mode: row.research_mode,
            },
            last_run_at: parse_optional_datetime(row.last_run_at)?,
            next_run_at: parse_optional_datetime(row.next_run_at)?,
            in_progress_until: parse_optional_datetime(row.in_progress_until)?,
            last_error: row.last_error,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::NewRun;
    use chrono::Duration;

    async fn setup_test_repo() -> SqliteRunRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRunRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let repo = setup_test_repo().await;
        let run = Run::create(
            NewRun::new("alice", 12, 3)
                .with_strategy(ModeStrategy::Cycling)
                .with_early_stop(true)
                .with_research_mode(true),
        )
        .unwrap();
        repo.create(&run).await.unwrap();

        let stored = repo.get(run.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, "alice");
        assert_eq!(stored.phase, RunPhase::Phase1);
        assert_eq!(stored.status, RunStatus::Active);
        assert_eq!(stored.target_steps, 12);
        assert_eq!(stored.phase1.strategy, ModeStrategy::Cycling);
        assert!(stored.phase1.early_stop_enabled);
        assert!(stored.phase2.research_mode);
        assert_eq!(repo.get_owner(run.id).await.unwrap().as_deref(), Some("alice"));
        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_due_filters_status_and_time() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        let due = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        let mut later = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        later.next_run_at = Some(now + Duration::minutes(10));
        let mut done = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        done.status = RunStatus::Completed;

        for run in [&due, &later, &done] {
            repo.create(run).await.unwrap();
        }

        let listed = repo.list_due(now + Duration::seconds(1), 5).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
    }

    #[tokio::test]
    async fn test_list_due_respects_limit_and_order() {
        let repo = setup_test_repo().await;
        let now = Utc::now();
        let mut ids = Vec::new();
        for offset in [30, 10, 20] {
            let mut run = Run::create(NewRun::new("bob", 3, 1)).unwrap();
            run.next_run_at = Some(now - Duration::seconds(offset));
            repo.create(&run).await.unwrap();
            ids.push((offset, run.id));
        }

        let listed = repo.list_due(now, 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, ids[0].1);
        assert_eq!(listed[1].id, ids[2].1);
    }

    #[tokio::test]
    async fn test_list_due_skips_held_locks() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        for offset in 1..=5 {
            let mut locked = Run::create(NewRun::new("alice", 3, 1)).unwrap();
            locked.next_run_at = Some(now - Duration::minutes(10 - offset));
            locked.in_progress_until = Some(now + Duration::minutes(12));
            repo.create(&locked).await.unwrap();
        }
        let mut expired = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        expired.next_run_at = Some(now - Duration::minutes(1));
        expired.in_progress_until = Some(now - Duration::seconds(1));
        repo.create(&expired).await.unwrap();
        let mut free = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        free.next_run_at = Some(now);
        repo.create(&free).await.unwrap();

        let listed: Vec<Uuid> = repo.list_due(now, 5).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![expired.id, free.id]);
    }

    #[tokio::test]
    async fn test_update_under_lock_requires_same_lock() {
        let repo = setup_test_repo().await;
        let mut run = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        repo.create(&run).await.unwrap();

        let now = Utc::now();
        let lock = now + Duration::minutes(12);
        assert!(repo.try_acquire_lock(run.id, now, lock).await.unwrap());

        run.steps_completed = 1;
        run.in_progress_until = None;
        assert!(!repo.update_under_lock(&run, lock + Duration::seconds(1)).await.unwrap());
        assert_eq!(repo.get(run.id).await.unwrap().unwrap().steps_completed, 0);

        assert!(repo.update_under_lock(&run, lock).await.unwrap());
        let stored = repo.get(run.id).await.unwrap().unwrap();
        assert_eq!(stored.steps_completed, 1);
        assert!(stored.in_progress_until.is_none());

        // The lock is gone, so a second commit under it is refused
        assert!(!repo.update_under_lock(&run, lock).await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_if_active_blocks_later_locked_commit() {
        let repo = setup_test_repo().await;
        let mut run = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        repo.create(&run).await.unwrap();

        let now = Utc::now();
        let lock = now + Duration::minutes(12);
        assert!(repo.try_acquire_lock(run.id, now, lock).await.unwrap());
        assert!(repo.fail_if_active(run.id, "ownership mismatch", now).await.unwrap());
        assert!(!repo.fail_if_active(run.id, "again", now).await.unwrap());

        run.steps_completed = 1;
        assert!(!repo.update_under_lock(&run, lock).await.unwrap());

        let stored = repo.get(run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.steps_completed, 0);
        assert!(stored.in_progress_until.is_none());
        assert!(stored.next_run_at.is_none());
        assert_eq!(stored.last_error.as_deref(), Some("ownership mismatch"));
    }

    #[tokio::test]
    async fn test_oversized_delay_is_rejected_not_truncated() {
        let repo = setup_test_repo().await;
        let mut run = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        run.phase1.delay_secs = u64::MAX;
        assert!(matches!(repo.create(&run).await, Err(DomainError::ValidationFailed(_))));
        assert!(repo.get(run.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_expiry() {
        let repo = setup_test_repo().await;
        let run = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        repo.create(&run).await.unwrap();

        let now = Utc::now();
        assert!(repo.try_acquire_lock(run.id, now, now + Duration::minutes(12)).await.unwrap());
        assert!(!repo.try_acquire_lock(run.id, now, now + Duration::minutes(12)).await.unwrap());

        let after_expiry = now + Duration::minutes(13);
        assert!(repo
            .try_acquire_lock(run.id, after_expiry, after_expiry + Duration::minutes(12))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_lock_refused_for_terminal_run() {
        let repo = setup_test_repo().await;
        let mut run = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        run.status = RunStatus::Failed;
        repo.create(&run).await.unwrap();

        let now = Utc::now();
        assert!(!repo.try_acquire_lock(run.id, now, now + Duration::minutes(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_persists_progress() {
        let repo = setup_test_repo().await;
        let mut run = Run::create(NewRun::new("alice", 3, 2)).unwrap();
        repo.create(&run).await.unwrap();

        run.steps_completed = 3;
        run.phase = RunPhase::Phase2;
        run.last_error = Some("boom".into());
        run.updated_at = Utc::now();
        repo.update(&run).await.unwrap();

        let stored = repo.get(run.id).await.unwrap().unwrap();
        assert_eq!(stored.steps_completed, 3);
        assert_eq!(stored.phase, RunPhase::Phase2);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));

        let missing = Run::create(NewRun::new("alice", 1, 1)).unwrap();
        assert!(matches!(repo.update(&missing).await, Err(DomainError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let repo = setup_test_repo().await;
        let mut failed = Run::create(NewRun::new("alice", 3, 1)).unwrap();
        failed.status = RunStatus::Failed;
        repo.create(&failed).await.unwrap();
        repo.create(&Run::create(NewRun::new("alice", 3, 1)).unwrap()).await.unwrap();
        repo.create(&Run::create(NewRun::new("bob", 3, 1)).unwrap()).await.unwrap();

        let alice = repo.list(RunFilter { owner_id: Some("alice".into()), ..Default::default() }).await.unwrap();
        assert_eq!(alice.len(), 2);

        let failed_runs = repo.list(RunFilter { status: Some(RunStatus::Failed), ..Default::default() }).await.unwrap();
        assert_eq!(failed_runs.len(), 1);
        assert_eq!(failed_runs[0].id, failed.id);

        let limited = repo.list(RunFilter { limit: Some(1), ..Default::default() }).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
