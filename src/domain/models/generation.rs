//! Request/response types exchanged with external generation routines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{ArtifactScores, GenerationMode};

/// External generation routine to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationRoutine {
    SingleStep,
    PanelDebate,
    GroundingPanel,
    Adversarial,
}

impl GenerationRoutine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleStep => "single_step",
            Self::PanelDebate => "panel_debate",
            Self::GroundingPanel => "grounding_panel",
            Self::Adversarial => "adversarial",
        }
    }

    /// Multi-agent routines fan out several sequential sub-calls and get the long timeout.
    pub fn is_multi_agent(&self) -> bool {
        !matches!(self, Self::SingleStep)
    }

    /// Endpoint path segment used by HTTP-backed generators.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Self::SingleStep => "single-step",
            Self::PanelDebate => "panel-debate",
            Self::GroundingPanel => "grounding-panel",
            Self::Adversarial => "adversarial",
        }
    }
}

impl From<GenerationMode> for GenerationRoutine {
    fn from(mode: GenerationMode) -> Self {
        match mode {
            GenerationMode::Base => Self::SingleStep,
            GenerationMode::PanelDebate => Self::PanelDebate,
            GenerationMode::GroundingPanel => Self::GroundingPanel,
            GenerationMode::Adversarial => Self::Adversarial,
        }
    }
}

impl std::fmt::Display for GenerationRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub run_id: Uuid,
    pub routine: GenerationRoutine,
    pub mode: GenerationMode,
    pub step_index: u32,
    pub research_mode: bool,
    /// Preferred provider order; the routine falls back down the list.
    #[serde(default)]
    pub provider_order: Vec<String>,
}

/// Artifact content returned by a routine, before sequencing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub body: String,
    #[serde(default)]
    pub scores: ArtifactScores,
    #[serde(default = "default_true")]
    pub is_valid: bool,
}

fn default_true() -> bool {
    true
}

/// `{success, artifact?, error?}` as returned by every routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub artifact: Option<GeneratedArtifact>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerationResponse {
    pub fn ok(artifact: GeneratedArtifact) -> Self {
        Self { success: true, artifact: Some(artifact), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, artifact: None, error: Some(error.into()) }
    }
}
