//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters must implement:
//! - RunRepository: persistence and soft locking of runs
//! - ArtifactRepository: uniqueness-constrained artifact storage
//! - RunEventRepository: append-only run audit log
//! - Generator: external generation routines
//!
//! These traits keep the orchestrator independent of any particular store
//! or provider.

pub mod artifact_repository;
pub mod generator;
pub mod run_event_repository;
pub mod run_repository;

pub use artifact_repository::ArtifactRepository;
pub use generator::Generator;
pub use run_event_repository::RunEventRepository;
pub use run_repository::{RunFilter, RunRepository};
