pub mod artifact;
pub mod config;
pub mod generation;
pub mod run;
pub mod run_event;

pub use artifact::{Artifact, ArtifactScores, GenerationMode, NewArtifact};
pub use config::{
    BackoffConfig, Config, ConvergenceConfig, DatabaseConfig, GenerationConfig, LoggingConfig,
    SchedulerConfig, SelectionConfig, SequencingConfig,
};
pub use generation::{GeneratedArtifact, GenerationRequest, GenerationResponse, GenerationRoutine};
pub use run::{ModeStrategy, NewRun, Phase1Settings, Phase2Settings, Run, RunPhase, RunStatus, MAX_DELAY_SECS};
pub use run_event::{EventLevel, RunEvent};
