//! Maps a run's phase, strategy and step index to a unit of work.
//!
//! Dispatch is a pure function; invoking the routine is the state machine's job.

use std::time::Duration;

use serde::Serialize;

use crate::domain::models::{GenerationConfig, GenerationMode, GenerationRoutine, ModeStrategy, RunPhase};
use crate::domain::models::GenerationMode::{
    Adversarial as ADV, Base as BASE, GroundingPanel as GRD, PanelDebate as PNL,
};

/// Length of the phase 1 cycling pattern.
pub const CYCLE_LENGTH: usize = 25;

/// Phase 1 cycling pattern: base ×8, panel ×2, base ×8, grounding ×2,
/// adversarial ×2, base ×3. Slot 0 begins a new cycle.
pub const CYCLE: [GenerationMode; CYCLE_LENGTH] = [
    BASE, BASE, BASE, BASE, BASE, BASE, BASE, BASE, //
    PNL, PNL, //
    BASE, BASE, BASE, BASE, BASE, BASE, BASE, BASE, //
    GRD, GRD, //
    ADV, ADV, //
    BASE, BASE, BASE,
];

/// Concrete unit of work for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepPlan {
    pub routine: GenerationRoutine,
    pub mode: GenerationMode,
    pub research_mode: bool,
}

/// Mode for a zero-based phase 1 step index under the cycling strategy.
pub fn cycle_mode(step_index: u32) -> GenerationMode {
    CYCLE[step_index as usize % CYCLE_LENGTH]
}

/// Decide what the next unit of work is.
///
/// `research_mode` only parameterizes phase 2; grounding slots inside the
/// phase 1 cycle always run without it.
pub fn dispatch(phase: RunPhase, strategy: ModeStrategy, step_index: u32, research_mode: bool) -> StepPlan {
    match phase {
        RunPhase::Phase1 => {
            let mode = match strategy {
                ModeStrategy::Single => GenerationMode::Base,
                ModeStrategy::Cycling => cycle_mode(step_index),
            };
            StepPlan { routine: GenerationRoutine::from(mode), mode, research_mode: false }
        }
        RunPhase::Phase2 => StepPlan {
            routine: GenerationRoutine::GroundingPanel,
            mode: GenerationMode::GroundingPanel,
            research_mode,
        },
    }
}

/// Hard timeouts per routine class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineTimeouts {
    pub single_step: Duration,
    pub multi_agent: Duration,
}

impl RoutineTimeouts {
    pub fn for_routine(&self, routine: GenerationRoutine) -> Duration {
        if routine.is_multi_agent() {
            self.multi_agent
        } else {
            self.single_step
        }
    }

    pub fn longest(&self) -> Duration {
        self.single_step.max(self.multi_agent)
    }
}

impl From<&GenerationConfig> for RoutineTimeouts {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            single_step: Duration::from_secs(config.single_step_timeout_secs),
            multi_agent: Duration::from_secs(config.multi_agent_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_strategy_always_base() {
        for i in 0..60 {
            let plan = dispatch(RunPhase::Phase1, ModeStrategy::Single, i, true);
            assert_eq!(plan.mode, GenerationMode::Base);
            assert_eq!(plan.routine, GenerationRoutine::SingleStep);
            assert!(!plan.research_mode);
        }
    }

    #[test]
    fn test_cycle_layout() {
        let count = |mode| CYCLE.iter().filter(|m| **m == mode).count();
        assert_eq!(count(GenerationMode::Base), 19);
        assert_eq!(count(GenerationMode::PanelDebate), 2);
        assert_eq!(count(GenerationMode::GroundingPanel), 2);
        assert_eq!(count(GenerationMode::Adversarial), 2);

        assert_eq!(cycle_mode(0), GenerationMode::Base);
        assert_eq!(cycle_mode(7), GenerationMode::Base);
        assert_eq!(cycle_mode(8), GenerationMode::PanelDebate);
        assert_eq!(cycle_mode(9), GenerationMode::PanelDebate);
        assert_eq!(cycle_mode(10), GenerationMode::Base);
        assert_eq!(cycle_mode(17), GenerationMode::Base);
        assert_eq!(cycle_mode(18), GenerationMode::GroundingPanel);
        assert_eq!(cycle_mode(19), GenerationMode::GroundingPanel);
        assert_eq!(cycle_mode(20), GenerationMode::Adversarial);
        assert_eq!(cycle_mode(21), GenerationMode::Adversarial);
        assert_eq!(cycle_mode(22), GenerationMode::Base);
        assert_eq!(cycle_mode(24), GenerationMode::Base);
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(cycle_mode(25), GenerationMode::Base);
        assert_eq!(cycle_mode(33), GenerationMode::PanelDebate);
        assert_eq!(cycle_mode(25 * 4 + 20), GenerationMode::Adversarial);
    }

    #[test]
    fn test_cycling_routes_to_matching_routine() {
        let plan = dispatch(RunPhase::Phase1, ModeStrategy::Cycling, 18, true);
        assert_eq!(plan.routine, GenerationRoutine::GroundingPanel);
        assert!(!plan.research_mode);

        let plan = dispatch(RunPhase::Phase1, ModeStrategy::Cycling, 8, false);
        assert_eq!(plan.routine, GenerationRoutine::PanelDebate);
    }

    #[test]
    fn test_phase2_always_grounding_with_research_flag() {
        for strategy in [ModeStrategy::Single, ModeStrategy::Cycling] {
            for i in [0, 1, 8, 20] {
                let plan = dispatch(RunPhase::Phase2, strategy, i, true);
                assert_eq!(plan.routine, GenerationRoutine::GroundingPanel);
                assert!(plan.research_mode);
                assert!(!dispatch(RunPhase::Phase2, strategy, i, false).research_mode);
            }
        }
    }

    #[test]
    fn test_timeouts_by_routine_class() {
        let timeouts = RoutineTimeouts::from(&GenerationConfig::default());
        assert_eq!(timeouts.for_routine(GenerationRoutine::SingleStep), Duration::from_secs(90));
        assert_eq!(timeouts.for_routine(GenerationRoutine::Adversarial), Duration::from_secs(600));
        assert_eq!(timeouts.longest(), Duration::from_secs(600));
    }
}
