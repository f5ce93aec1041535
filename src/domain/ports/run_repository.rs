//! Repository port for run persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Run, RunStatus};

/// Filter for listing runs.
#[derive(Debug, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub owner_id: Option<String>,
    pub limit: Option<u32>,
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Persist a newly created run.
    async fn create(&self, run: &Run) -> DomainResult<()>;

    /// Get a run by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Run>>;

    /// Fetch only the owning principal of a run.
    async fn get_owner(&self, id: Uuid) -> DomainResult<Option<String>>;

    /// Active, unlocked runs whose `next_run_at` is at or before `now`, oldest due first.
    ///
    /// A run whose soft lock is still held at `now` is left out so it cannot
    /// occupy a batch slot; the state machine still re-checks the lock.
    async fn list_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<Run>>;

    /// Set `in_progress_until = until` if the lock is free at `now`.
    ///
    /// Returns false when another tick already holds the lock.
    async fn try_acquire_lock(&self, id: Uuid, now: DateTime<Utc>, until: DateTime<Utc>) -> DomainResult<bool>;

    /// Write every mutable field of the run in a single row update.
    async fn update(&self, run: &Run) -> DomainResult<()>;

    /// Like [`update`](Self::update), but only while the run is still active
    /// and its lock still expires at `lock_until`.
    ///
    /// Returns false, writing nothing, when the lock was lost or another
    /// writer moved the run to a terminal status.
    async fn update_under_lock(&self, run: &Run, lock_until: DateTime<Utc>) -> DomainResult<bool>;

    /// Mark an active run failed without touching its progress counters.
    ///
    /// Returns false when the run was no longer active.
    async fn fail_if_active(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> DomainResult<bool>;

    /// List runs, most recently created first.
    async fn list(&self, filter: RunFilter) -> DomainResult<Vec<Run>>;
}
