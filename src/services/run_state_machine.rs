//! Run state machine.
//!
//! Owns every mutation of a run: ownership validation, soft locking, one
//! unit of work per call, phase transitions and backoff on transient errors.
//!
//! ```text
//! phase1 ──step──▶ phase1 ──target / early stop──▶ phase2 ──round──▶ phase2 ──target──▶ completed
//!    └──────────── ownership mismatch / non-transient error ────────────────────────────▶ failed
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::candidate_selector::{select_from_artifacts, Selection, SelectionPolicy};
use super::convergence_detector::{analyze, early_stop_check, EARLY_STOP_SAMPLE};
use super::step_dispatcher::{dispatch, RoutineTimeouts, StepPlan};
use super::step_sequencer::StepSequencer;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Artifact, Config, ConvergenceConfig, GeneratedArtifact, GenerationRequest, NewArtifact, NewRun, Run,
    RunEvent, RunPhase, RunStatus,
};
use crate::domain::ports::{ArtifactRepository, Generator, RunEventRepository, RunRepository};

/// Orchestrator settings, constructed once per process from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Soft-lock duration; must exceed the longest routine timeout.
    pub lock_ceiling: Duration,
    pub timeouts: RoutineTimeouts,
    pub phase1_backoff: Duration,
    pub phase2_backoff: Duration,
    pub sequencing_attempts: u32,
    pub convergence: ConvergenceConfig,
    pub selection: SelectionPolicy,
    pub selection_window: u32,
    pub provider_order: Vec<String>,
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            lock_ceiling: Duration::from_secs(config.scheduler.lock_ceiling_secs),
            timeouts: RoutineTimeouts::from(&config.generation),
            phase1_backoff: Duration::from_secs(config.backoff.phase1_error_secs),
            phase2_backoff: Duration::from_secs(config.backoff.phase2_error_secs),
            sequencing_attempts: config.sequencing.max_attempts,
            convergence: config.convergence.clone(),
            selection: SelectionPolicy::from(&config.selection),
            selection_window: config.selection.window,
            provider_order: config.generation.provider_order.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl OrchestratorSettings {
    pub fn backoff_for(&self, phase: RunPhase) -> Duration {
        match phase {
            RunPhase::Phase1 => self.phase1_backoff,
            RunPhase::Phase2 => self.phase2_backoff,
        }
    }
}

/// Why a run was left untouched this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Another tick holds the soft lock.
    Locked { until: DateTime<Utc> },
    /// Lost the race to acquire the soft lock.
    LockContended,
    /// The run is already terminal.
    NotActive { status: RunStatus },
    /// The lock expired and was taken over before this tick could commit;
    /// its result was discarded.
    LockLost,
}

/// Result of one `process_run` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// One unit of work succeeded; the run stays in its phase.
    Advanced { phase: RunPhase, step_number: u32 },
    /// Phase 1 finished and the run moved to phase 2.
    PhaseCompleted { steps_completed: u32, early_stop: bool },
    /// Phase 2 round target reached.
    Completed { rounds_completed: u32 },
    /// Transient error; retry at `next_run_at`.
    Rescheduled { error: String, next_run_at: DateTime<Utc> },
    /// The run is now terminally failed.
    Failed { reason: String },
    Skipped(SkipReason),
}

impl RunOutcome {
    /// Whether the run was actually handled (anything but a skip).
    pub fn was_processed(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

/// A finished unit of work: the new run row, the events to append once it
/// is committed, and the outcome.
struct Transition {
    run: Run,
    events: Vec<RunEvent>,
    outcome: RunOutcome,
}

pub struct RunStateMachine {
    runs: Arc<dyn RunRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    events: Arc<dyn RunEventRepository>,
    generator: Arc<dyn Generator>,
    sequencer: StepSequencer,
    settings: OrchestratorSettings,
}

impl RunStateMachine {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        events: Arc<dyn RunEventRepository>,
        generator: Arc<dyn Generator>,
        settings: OrchestratorSettings,
    ) -> Self {
        let sequencer = StepSequencer::new(artifacts.clone(), settings.sequencing_attempts);
        Self { runs, artifacts, events, generator, sequencer, settings }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn runs(&self) -> &Arc<dyn RunRepository> {
        &self.runs
    }

    /// Create a run on behalf of the initiation flow.
    pub async fn create_run(&self, new: NewRun) -> DomainResult<Run> {
        let run = Run::create(new)?;
        self.runs.create(&run).await?;
        self.events
            .append(&RunEvent::info(
                run.id,
                "run created",
                json!({
                    "target_steps": run.target_steps,
                    "rounds_target": run.rounds_target,
                    "strategy": run.phase1.strategy.as_str(),
                    "early_stop": run.phase1.early_stop_enabled,
                    "research_mode": run.phase2.research_mode,
                }),
            ))
            .await?;
        info!(run_id = %run.id, owner = %run.owner_id, "run created");
        Ok(run)
    }

    /// Advance one run by one unit of work on behalf of `principal`.
    ///
    /// Errors are only returned when the run cannot be read or written at
    /// all; transient failures become `Rescheduled` and fatal ones `Failed`.
    #[instrument(skip(self, principal), fields(run_id = %run_id))]
    pub async fn process_run(&self, run_id: Uuid, principal: &str) -> DomainResult<RunOutcome> {
        let owner = self.runs.get_owner(run_id).await?.ok_or(DomainError::RunNotFound(run_id))?;
        let run = self.runs.get(run_id).await?.ok_or(DomainError::RunNotFound(run_id))?;

        if owner != principal {
            let err = DomainError::OwnershipMismatch { run_id, principal: principal.to_string() };
            if run.status.is_terminal() {
                warn!(status = %run.status, "ownership mismatch on terminal run");
                return Err(err);
            }
            return self.fail(run, None, &err).await;
        }

        if run.status != RunStatus::Active {
            debug!(status = %run.status, "run not active, skipping");
            return Ok(RunOutcome::Skipped(SkipReason::NotActive { status: run.status }));
        }

        let now = Utc::now();
        if let Some(until) = run.locked_until(now) {
            debug!(%until, "run locked by another tick, skipping");
            return Ok(RunOutcome::Skipped(SkipReason::Locked { until }));
        }

        let lock = after(now, self.settings.lock_ceiling)?;
        if !self.runs.try_acquire_lock(run_id, now, lock).await? {
            debug!("lost soft-lock race, skipping");
            return Ok(RunOutcome::Skipped(SkipReason::LockContended));
        }
        // Re-read under the lock; the snapshot above may predate another tick's commit.
        let run = self.runs.get(run_id).await?.ok_or(DomainError::RunNotFound(run_id))?;

        let result = match run.phase {
            RunPhase::Phase1 => self.phase1_step(&run).await,
            RunPhase::Phase2 => self.phase2_round(&run).await,
        };

        match result {
            Ok(transition) => self.commit(transition, lock).await,
            Err(err) if err.is_transient() => self.reschedule(run, lock, &err).await,
            Err(err) => self.fail(run, Some(lock), &err).await,
        }
    }

    async fn phase1_step(&self, run: &Run) -> DomainResult<Transition> {
        let plan = dispatch(RunPhase::Phase1, run.phase1.strategy, run.steps_completed, run.phase2.research_mode);
        let generated = self.invoke(run, &plan).await?;
        let artifact = self.persist(run, &plan, generated).await?;

        let now = Utc::now();
        let mut next = run.clone();
        next.steps_completed += 1;
        next.last_run_at = Some(now);

        let target_reached = next.phase1_target_reached();
        let early_stop = if run.phase1.early_stop_enabled && !target_reached {
            let recent = self.artifacts.list_recent_valid(run.id, RunPhase::Phase1, EARLY_STOP_SAMPLE as u32).await?;
            let bodies: Vec<&str> = recent.iter().map(|a| a.body.as_str()).collect();
            let check = early_stop_check(&bodies, self.settings.convergence.early_stop_threshold);
            debug!(average = ?check.average_similarity, triggered = check.triggered, "early-stop check");
            check.triggered
        } else {
            false
        };

        if !target_reached && !early_stop {
            next.next_run_at = Some(after(now, Duration::from_secs(run.phase1.delay_secs))?);
            info!(step = artifact.step_number, mode = %plan.mode, "phase 1 step generated");
            let event = RunEvent::info(
                run.id,
                format!("phase 1 step {} generated", next.steps_completed),
                json!({
                    "step_number": artifact.step_number,
                    "mode": plan.mode.as_str(),
                    "routine": plan.routine.as_str(),
                    "steps_completed": next.steps_completed,
                    "target_steps": next.target_steps,
                }),
            );
            return Ok(Transition {
                run: next,
                events: vec![event],
                outcome: RunOutcome::Advanced { phase: RunPhase::Phase1, step_number: artifact.step_number },
            });
        }

        next.phase = RunPhase::Phase2;
        next.next_run_at = Some(after(now, Duration::from_secs(run.phase2.delay_secs))?);

        let window = self.artifacts.list_recent_valid(run.id, RunPhase::Phase1, self.settings.selection_window).await?;
        let mut events = Vec::with_capacity(2);
        if run.phase1.auto_select_enabled {
            events.push(self.selection_event(run.id, &window)?);
        }
        let convergence = analyze(window.iter().map(|a| a.body.as_str()), &self.settings.convergence);
        info!(steps = next.steps_completed, early_stop, "phase 1 complete, entering phase 2");

        let reason = if early_stop { "convergence early stop" } else { "step target reached" };
        events.push(RunEvent::info(
            run.id,
            format!("phase 1 complete after {} steps ({reason})", next.steps_completed),
            json!({
                "step_number": artifact.step_number,
                "mode": plan.mode.as_str(),
                "steps_completed": next.steps_completed,
                "target_steps": next.target_steps,
                "early_stop": early_stop,
                "convergence": convergence,
            }),
        ));
        Ok(Transition {
            run: next,
            events,
            outcome: RunOutcome::PhaseCompleted { steps_completed: run.steps_completed + 1, early_stop },
        })
    }

    async fn phase2_round(&self, run: &Run) -> DomainResult<Transition> {
        let plan = dispatch(RunPhase::Phase2, run.phase1.strategy, run.rounds_completed, run.phase2.research_mode);
        let generated = self.invoke(run, &plan).await?;
        let artifact = self.persist(run, &plan, generated).await?;

        let now = Utc::now();
        let mut next = run.clone();
        next.rounds_completed += 1;
        next.last_run_at = Some(now);

        let payload = json!({
            "step_number": artifact.step_number,
            "research_mode": plan.research_mode,
            "rounds_completed": next.rounds_completed,
            "rounds_target": next.rounds_target,
        });

        if next.phase2_target_reached() {
            next.status = RunStatus::Completed;
            next.next_run_at = None;
            info!(rounds = next.rounds_completed, "run completed");
            let event = RunEvent::info(run.id, format!("run completed after {} grounding rounds", next.rounds_completed), payload);
            let outcome = RunOutcome::Completed { rounds_completed: next.rounds_completed };
            return Ok(Transition { run: next, events: vec![event], outcome });
        }

        next.next_run_at = Some(after(now, Duration::from_secs(run.phase2.delay_secs))?);
        info!(round = next.rounds_completed, "grounding round complete");
        let event = RunEvent::info(run.id, format!("grounding round {} complete", next.rounds_completed), payload);
        Ok(Transition {
            run: next,
            events: vec![event],
            outcome: RunOutcome::Advanced { phase: RunPhase::Phase2, step_number: artifact.step_number },
        })
    }

    /// Call the routine under its hard timeout. A timed-out call is abandoned.
    async fn invoke(&self, run: &Run, plan: &StepPlan) -> DomainResult<GeneratedArtifact> {
        let request = GenerationRequest {
            run_id: run.id,
            routine: plan.routine,
            mode: plan.mode,
            step_index: run.current_step_index(),
            research_mode: plan.research_mode,
            provider_order: self.settings.provider_order.clone(),
        };
        let timeout = self.settings.timeouts.for_routine(plan.routine);
        debug!(routine = %plan.routine, generator = self.generator.name(), ?timeout, "invoking generation routine");

        let response = tokio::time::timeout(timeout, self.generator.generate(request))
            .await
            .map_err(|_| DomainError::GenerationTimeout(timeout))??;

        if !response.success {
            let message = response.error.unwrap_or_else(|| "routine reported failure".to_string());
            return Err(DomainError::GenerationFailed(message));
        }
        response
            .artifact
            .ok_or_else(|| DomainError::GenerationFailed("routine returned no artifact".to_string()))
    }

    async fn persist(&self, run: &Run, plan: &StepPlan, generated: GeneratedArtifact) -> DomainResult<Artifact> {
        let draft = NewArtifact {
            run_id: run.id,
            phase: run.phase,
            body: generated.body,
            mode: plan.mode,
            scores: generated.scores,
            is_valid: generated.is_valid,
        };
        self.sequencer.append(&draft).await
    }

    /// Run the selector over the phase 1 window and describe the result as an event.
    fn selection_event(&self, run_id: Uuid, window: &[Artifact]) -> DomainResult<RunEvent> {
        let selection = select_from_artifacts(window, &self.settings.selection);
        let event = match &selection {
            Selection::Winner { winner, .. } => {
                info!(step = winner.candidate.step_number, score = winner.score, "winning artifact selected");
                RunEvent::info(
                    run_id,
                    format!("selected step {} as winner (score {:.2})", winner.candidate.step_number, winner.score),
                    serde_json::to_value(&selection)?,
                )
            }
            Selection::Skipped { reason, .. } => {
                info!(%reason, "winner selection skipped");
                RunEvent::info(run_id, format!("winner selection skipped: {reason}"), serde_json::to_value(&selection)?)
            }
        };
        Ok(event)
    }

    /// Write the new run row while the lock is still ours, then append its events.
    async fn commit(&self, transition: Transition, lock: DateTime<Utc>) -> DomainResult<RunOutcome> {
        let Transition { mut run, events, outcome } = transition;
        run.in_progress_until = None;
        run.last_error = None;
        run.updated_at = Utc::now();
        if !self.runs.update_under_lock(&run, lock).await? {
            return self.superseded(run.id).await;
        }
        for event in &events {
            self.events.append(event).await?;
        }
        Ok(outcome)
    }

    async fn reschedule(&self, mut run: Run, lock: DateTime<Utc>, err: &DomainError) -> DomainResult<RunOutcome> {
        let now = Utc::now();
        let backoff = self.settings.backoff_for(run.phase);
        let next_run_at = match after(now, backoff) {
            Ok(at) => at,
            Err(overflow) => return self.fail(run, Some(lock), &overflow).await,
        };
        warn!(phase = %run.phase, error = %err, ?backoff, "transient error, rescheduling run");

        run.next_run_at = Some(next_run_at);
        run.in_progress_until = None;
        run.last_error = Some(err.to_string());
        run.updated_at = now;
        if !self.runs.update_under_lock(&run, lock).await? {
            return self.superseded(run.id).await;
        }
        self.events
            .append(&RunEvent::warn(
                run.id,
                format!("{} unit of work failed, retrying in {}s", run.phase, backoff.as_secs()),
                json!({
                    "error": err.to_string(),
                    "phase": run.phase.as_str(),
                    "next_run_at": next_run_at,
                }),
            ))
            .await?;
        Ok(RunOutcome::Rescheduled { error: err.to_string(), next_run_at })
    }

    /// Move the run to `failed`. Without `lock` only the status columns are
    /// written, so a concurrent tick's progress is not overwritten.
    async fn fail(&self, mut run: Run, lock: Option<DateTime<Utc>>, err: &DomainError) -> DomainResult<RunOutcome> {
        error!(
            phase = %run.phase,
            steps_completed = run.steps_completed,
            rounds_completed = run.rounds_completed,
            error = %err,
            "run failed"
        );
        run.status = RunStatus::Failed;
        run.in_progress_until = None;
        run.next_run_at = None;
        run.last_error = Some(err.to_string());
        run.updated_at = Utc::now();
        let applied = match lock {
            Some(lock) => self.runs.update_under_lock(&run, lock).await?,
            None => self.runs.fail_if_active(run.id, &err.to_string(), run.updated_at).await?,
        };
        if !applied {
            return self.superseded(run.id).await;
        }
        self.events
            .append(&RunEvent::error(
                run.id,
                format!("run failed: {err}"),
                json!({
                    "error": err.to_string(),
                    "phase": run.phase.as_str(),
                    "steps_completed": run.steps_completed,
                    "rounds_completed": run.rounds_completed,
                }),
            ))
            .await?;
        Ok(RunOutcome::Failed { reason: err.to_string() })
    }

    /// A guarded write found the run changed underneath this tick.
    async fn superseded(&self, run_id: Uuid) -> DomainResult<RunOutcome> {
        let status = self.runs.get(run_id).await?.ok_or(DomainError::RunNotFound(run_id))?.status;
        if status.is_terminal() {
            warn!(%status, "run went terminal while this tick held the lock, discarding result");
            return Ok(RunOutcome::Skipped(SkipReason::NotActive { status }));
        }
        warn!("soft lock expired before commit, discarding result");
        Ok(RunOutcome::Skipped(SkipReason::LockLost))
    }
}

/// `from + delay`, or `ScheduleOutOfRange` when the instant is not representable.
fn after(from: DateTime<Utc>, delay: Duration) -> DomainResult<DateTime<Utc>> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .ok_or(DomainError::ScheduleOutOfRange(delay))
}
