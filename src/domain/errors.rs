//! Domain errors for the Cartographer orchestrator.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while orchestrating runs.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Run {run_id} is owned by another principal (requested by {principal})")]
    OwnershipMismatch { run_id: Uuid, principal: String },


    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A uniqueness constraint rejected the write; the caller may re-read and retry.
    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Step numbering for run {run_id} still conflicted after {attempts} attempts")]
    SequencingExhausted { run_id: Uuid, attempts: u32 },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Scheduling {0:?} ahead is out of range")]
    ScheduleOutOfRange(Duration),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl DomainError {
    /// Whether the error should leave the run active and reschedule it.
    ///
    /// Provider failures, timeouts and exhausted step numbering are transient.
    /// Everything else crossing the state machine boundary fails the run.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailed(_) | Self::GenerationTimeout(_) | Self::SequencingExhausted { .. }
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
