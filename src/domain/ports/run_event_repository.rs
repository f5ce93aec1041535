//! Repository port for the append-only run event log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::RunEvent;

#[async_trait]
pub trait RunEventRepository: Send + Sync {
    /// Append an event. Events are never updated or deleted.
    async fn append(&self, event: &RunEvent) -> DomainResult<()>;

    /// Events of a run in the order they were recorded.
    async fn list_by_run(&self, run_id: Uuid, limit: Option<u32>) -> DomainResult<Vec<RunEvent>>;
}
