//! Repository port for artifact persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Artifact, RunPhase};

#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Highest step number stored for the run, if any.
    async fn max_step_number(&self, run_id: Uuid) -> DomainResult<Option<u32>>;

    /// Insert an artifact.
    ///
    /// A collision on `(run_id, step_number)` must surface as
    /// `DomainError::ConcurrencyConflict` so the sequencer can retry; any
    /// other failure is returned as a regular storage error.
    async fn insert(&self, artifact: &Artifact) -> DomainResult<()>;

    /// The most recent `limit` valid artifacts of a phase, in step order.
    async fn list_recent_valid(&self, run_id: Uuid, phase: RunPhase, limit: u32) -> DomainResult<Vec<Artifact>>;

    /// All artifacts of the run in step order.
    async fn list_by_run(&self, run_id: Uuid) -> DomainResult<Vec<Artifact>>;
}
