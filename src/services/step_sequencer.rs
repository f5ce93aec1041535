//! Concurrency-safe step numbering for artifacts.
//!
//! Optimistic: read the run's max step number, propose `max + 1`, insert,
//! and start over when the store rejects the number as a duplicate. The
//! `(run_id, step_number)` uniqueness constraint in the store is the only
//! real exclusion; the soft lock just keeps contention low.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Artifact, NewArtifact};
use crate::domain::ports::ArtifactRepository;

/// Default read-propose-persist attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct StepSequencer {
    artifacts: Arc<dyn ArtifactRepository>,
    max_attempts: u32,
}

impl StepSequencer {
    pub fn new(artifacts: Arc<dyn ArtifactRepository>, max_attempts: u32) -> Self {
        Self { artifacts, max_attempts: max_attempts.max(1) }
    }

    /// Persist `draft` under the next free step number of its run.
    ///
    /// Returns `SequencingExhausted` once every attempt hit a numbering
    /// conflict. Other storage errors are returned immediately.
    pub async fn append(&self, draft: &NewArtifact) -> DomainResult<Artifact> {
        for attempt in 1..=self.max_attempts {
            let current = self.artifacts.max_step_number(draft.run_id).await?;
            let proposed = current.map_or(1, |max| max + 1);
            let artifact = draft.numbered(proposed);

            match self.artifacts.insert(&artifact).await {
                Ok(()) => {
                    debug!(run_id = %draft.run_id, step = proposed, attempt, "artifact sequenced");
                    return Ok(artifact);
                }
                Err(DomainError::ConcurrencyConflict { .. }) => {
                    debug!(
                        run_id = %draft.run_id,
                        step = proposed,
                        attempt,
                        "step number taken by a concurrent writer, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                Err(err) => return Err(err),
            }
        }

        warn!(run_id = %draft.run_id, attempts = self.max_attempts, "step numbering retries exhausted");
        Err(DomainError::SequencingExhausted { run_id: draft.run_id, attempts: self.max_attempts })
    }
}
