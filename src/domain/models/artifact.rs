//! Generated artifacts (exploration steps) belonging to a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::RunPhase;

/// Generation mode used to produce an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Cheap single-step generation.
    Base,
    /// Alternate panel: multi-agent debate.
    PanelDebate,
    /// Grounding panel: evidence-checking multi-agent round.
    GroundingPanel,
    /// Adversarial critique of the current line of exploration.
    Adversarial,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::PanelDebate => "panel_debate",
            Self::GroundingPanel => "grounding_panel",
            Self::Adversarial => "adversarial",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "base" => Some(Self::Base),
            "panel_debate" | "panel-debate" => Some(Self::PanelDebate),
            "grounding_panel" | "grounding-panel" => Some(Self::GroundingPanel),
            "adversarial" => Some(Self::Adversarial),
            _ => None,
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally supplied quality scores. Opaque beyond the numeric fields read here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactScores {
    #[serde(default)]
    pub novelty: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub coherence: Option<f64>,
    #[serde(default)]
    pub testability: Option<f64>,
}

impl ArtifactScores {
    /// The support signal: depth when present, otherwise coherence.
    pub fn support(&self) -> Option<f64> {
        self.depth.or(self.coherence)
    }
}

/// A persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub run_id: Uuid,
    /// Unique within the run, strictly increasing, starting at 1.
    pub step_number: u32,
    pub phase: RunPhase,
    pub body: String,
    pub mode: GenerationMode,
    pub scores: ArtifactScores,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

/// An artifact awaiting a step number from the sequencer.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub body: String,
    pub mode: GenerationMode,
    pub scores: ArtifactScores,
    pub is_valid: bool,
}

impl NewArtifact {
    pub fn new(run_id: Uuid, phase: RunPhase, mode: GenerationMode, body: impl Into<String>) -> Self {
        Self {
            run_id,
            phase,
            body: body.into(),
            mode,
            scores: ArtifactScores::default(),
            is_valid: true,
        }
    }

    pub fn with_scores(mut self, scores: ArtifactScores) -> Self {
        self.scores = scores;
        self
    }

    /// Materialize the draft with an assigned step number.
    pub fn numbered(&self, step_number: u32) -> Artifact {
        Artifact {
            id: Uuid::new_v4(),
            run_id: self.run_id,
            step_number,
            phase: self.phase,
            body: self.body.clone(),
            mode: self.mode,
            scores: self.scores.clone(),
            is_valid: self.is_valid,
            created_at: Utc::now(),
        }
    }
}
