//! Exploration run domain model.
//!
//! A Run is one unattended exploration session. It advances through a
//! generation phase and a grounding phase, one unit of work per scheduler
//! tick, and is retained after reaching a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Longest delay a run may wait between units of work (30 days).
pub const MAX_DELAY_SECS: u64 = 30 * 24 * 60 * 60;

/// Phase a run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Generation phase: produce exploration steps.
    Phase1,
    /// Grounding/synthesis phase: run grounding panel rounds.
    Phase2,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase1 => "phase1",
            Self::Phase2 => "phase2",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "phase1" => Some(Self::Phase1),
            "phase2" => Some(Self::Phase2),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is being advanced by the scheduler.
    Active,
    /// Phase 2 round target reached.
    Completed,
    /// Terminal failure; requires explicit re-initiation.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How phase 1 picks a generation mode for each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeStrategy {
    /// Always use the base generation mode.
    #[default]
    Single,
    /// Follow the fixed 25-step diversity cycle.
    Cycling,
}

impl ModeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Cycling => "cycling",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single" => Some(Self::Single),
            "cycling" | "cycle" => Some(Self::Cycling),
            _ => None,
        }
    }
}

/// Phase 1 configuration carried by each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase1Settings {
    /// Delay between successful generation steps.
    pub delay_secs: u64,
    /// Stop phase 1 early once recent artifacts converge.
    pub early_stop_enabled: bool,
    pub strategy: ModeStrategy,
    /// Run the candidate selector when phase 1 ends.
    pub auto_select_enabled: bool,
}

impl Default for Phase1Settings {
    fn default() -> Self {
        Self {
            delay_secs: 60,
            early_stop_enabled: false,
            strategy: ModeStrategy::Single,
            auto_select_enabled: true,
        }
    }
}

/// Phase 2 configuration carried by each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase2Settings {
    /// Delay between successful grounding rounds.
    pub delay_secs: u64,
    pub research_mode: bool,
}

impl Default for Phase2Settings {
    fn default() -> Self {
        Self { delay_secs: 120, research_mode: false }
    }
}

/// A persisted exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    /// Principal that owns the run.
    pub owner_id: String,
    pub phase: RunPhase,
    pub status: RunStatus,

    // -- Progress --
    pub steps_completed: u32,
    pub target_steps: u32,
    pub rounds_completed: u32,
    pub rounds_target: u32,

    // -- Configuration --
    pub phase1: Phase1Settings,
    pub phase2: Phase2Settings,

    // -- Scheduling --
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    /// Soft-lock expiry. A tick holding the lock has until this time to finish.
    pub in_progress_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,

    // -- Timestamps --
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters supplied by the initiation flow when a run is created.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub owner_id: String,
    pub target_steps: u32,
    pub rounds_target: u32,
    pub phase1: Phase1Settings,
    pub phase2: Phase2Settings,
}

impl NewRun {
    pub fn new(owner_id: impl Into<String>, target_steps: u32, rounds_target: u32) -> Self {
        Self {
            owner_id: owner_id.into(),
            target_steps,
            rounds_target,
            phase1: Phase1Settings::default(),
            phase2: Phase2Settings::default(),
        }
    }

    // Builder methods
    pub fn with_strategy(mut self, strategy: ModeStrategy) -> Self {
        self.phase1.strategy = strategy;
        self
    }

    pub fn with_early_stop(mut self, enabled: bool) -> Self {
        self.phase1.early_stop_enabled = enabled;
        self
    }

    pub fn with_auto_select(mut self, enabled: bool) -> Self {
        self.phase1.auto_select_enabled = enabled;
        self
    }

    pub fn with_research_mode(mut self, enabled: bool) -> Self {
        self.phase2.research_mode = enabled;
        self
    }

    pub fn with_delays(mut self, phase1_secs: u64, phase2_secs: u64) -> Self {
        self.phase1.delay_secs = phase1_secs;
        self.phase2.delay_secs = phase2_secs;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.owner_id.trim().is_empty() {
            return Err(DomainError::ValidationFailed("owner_id cannot be empty".to_string()));
        }
        if self.target_steps == 0 {
            return Err(DomainError::ValidationFailed("target_steps must be at least 1".to_string()));
        }
        if self.rounds_target == 0 {
            return Err(DomainError::ValidationFailed("rounds_target must be at least 1".to_string()));
        }
        for (name, secs) in [("phase1 delay", self.phase1.delay_secs), ("phase2 delay", self.phase2.delay_secs)] {
            if secs > MAX_DELAY_SECS {
                return Err(DomainError::ValidationFailed(format!(
                    "{name} of {secs}s exceeds the {MAX_DELAY_SECS}s maximum"
                )));
            }
        }
        Ok(())
    }
}

impl Run {
    /// Build a fresh active run in phase 1, due immediately.
    pub fn create(new: NewRun) -> DomainResult<Self> {
        new.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            phase: RunPhase::Phase1,
            status: RunStatus::Active,
            steps_completed: 0,
            target_steps: new.target_steps,
            rounds_completed: 0,
            rounds_target: new.rounds_target,
            phase1: new.phase1,
            phase2: new.phase2,
            last_run_at: None,
            next_run_at: Some(now),
            in_progress_until: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Soft-lock expiry, if another tick still holds the lock at `now`.
    pub fn locked_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.in_progress_until.filter(|until| *until > now)
    }

    /// Zero-based index of the unit of work about to run in the current phase.
    pub fn current_step_index(&self) -> u32 {
        match self.phase {
            RunPhase::Phase1 => self.steps_completed,
            RunPhase::Phase2 => self.rounds_completed,
        }
    }

    pub fn phase1_target_reached(&self) -> bool {
        self.steps_completed >= self.target_steps
    }

    pub fn phase2_target_reached(&self) -> bool {
        self.rounds_completed >= self.rounds_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_create_run_defaults() {
        let run = Run::create(NewRun::new("alice", 10, 3)).unwrap();
        assert_eq!(run.phase, RunPhase::Phase1);
        assert_eq!(run.status, RunStatus::Active);
        assert_eq!(run.steps_completed, 0);
        assert!(run.next_run_at.is_some());
        assert!(run.in_progress_until.is_none());
    }

    #[test]
    fn test_new_run_validation() {
        assert!(Run::create(NewRun::new("", 1, 1)).is_err());
        assert!(Run::create(NewRun::new("alice", 0, 1)).is_err());
        assert!(Run::create(NewRun::new("alice", 1, 0)).is_err());
    }

    #[test]
    fn test_delay_upper_bound() {
        assert!(Run::create(NewRun::new("alice", 1, 1).with_delays(MAX_DELAY_SECS, MAX_DELAY_SECS)).is_ok());

        let err = Run::create(NewRun::new("alice", 5, 1).with_delays(100_000_000_000_000, 0)).unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(ref msg) if msg.contains("phase1 delay")));
        assert!(Run::create(NewRun::new("alice", 5, 1).with_delays(0, u64::MAX)).is_err());
    }

    #[test]
    fn test_lock_expiry() {
        let mut run = Run::create(NewRun::new("alice", 1, 1)).unwrap();
        let now = Utc::now();
        assert_eq!(run.locked_until(now), None);

        let until = now + Duration::seconds(30);
        run.in_progress_until = Some(until);
        assert_eq!(run.locked_until(now), Some(until));

        run.in_progress_until = Some(now - Duration::seconds(1));
        assert_eq!(run.locked_until(now), None);
    }

    #[test]
    fn test_enum_string_roundtrip() {
        for phase in [RunPhase::Phase1, RunPhase::Phase2] {
            assert_eq!(RunPhase::from_str(phase.as_str()), Some(phase));
        }
        for status in [RunStatus::Active, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(RunStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ModeStrategy::from_str("CYCLING"), Some(ModeStrategy::Cycling));
        assert_eq!(ModeStrategy::from_str("bogus"), None);
    }

    #[test]
    fn test_step_index_tracks_phase() {
        let mut run = Run::create(NewRun::new("alice", 5, 2)).unwrap();
        run.steps_completed = 4;
        assert_eq!(run.current_step_index(), 4);
        run.phase = RunPhase::Phase2;
        run.rounds_completed = 1;
        assert_eq!(run.current_step_index(), 1);
    }
}
