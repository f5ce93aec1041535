//! Generator port - interface for external generation routines.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{GenerationRequest, GenerationResponse};

/// Invokes the single-step, panel-debate, grounding-panel and adversarial
/// routines. Calls may take seconds to minutes; the caller enforces timeouts.
///
/// An `Err` means the routine could not be reached at all. A reachable
/// routine that reports failure returns `Ok` with `success: false`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, request: GenerationRequest) -> DomainResult<GenerationResponse>;
}
