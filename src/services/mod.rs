//! Orchestration services: the run state machine and the pure components it drives.

pub mod candidate_selector;
pub mod convergence_detector;
pub mod run_state_machine;
pub mod step_dispatcher;
pub mod step_sequencer;
pub mod tick_scheduler;

pub use candidate_selector::{select_from_artifacts, select_winner, Candidate, ScoredCandidate, Selection, SelectionPolicy};
pub use convergence_detector::{analyze, early_stop_check, ConvergenceDetector, ConvergenceReport, EarlyStopCheck};
pub use run_state_machine::{OrchestratorSettings, RunOutcome, RunStateMachine, SkipReason};
pub use step_dispatcher::{cycle_mode, dispatch, RoutineTimeouts, StepPlan, CYCLE};
pub use step_sequencer::StepSequencer;
pub use tick_scheduler::{
    InvocationResponse, RunReport, SchedulerHandle, TickReport, TickScheduler, TickSettings,
};
