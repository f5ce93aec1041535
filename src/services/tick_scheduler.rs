//! Periodic tick driver.
//!
//! A tick selects the due active runs (bounded by the batch size), hands
//! each to the state machine sequentially with a short pause in between,
//! and reports how many were processed. Per-run failures never abort the
//! rest of the batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::run_state_machine::{RunOutcome, RunStateMachine};
use crate::domain::errors::DomainResult;
use crate::domain::models::SchedulerConfig;
use crate::domain::ports::RunRepository;

/// Tick batching settings.
#[derive(Debug, Clone)]
pub struct TickSettings {
    pub batch_size: u32,
    pub inter_run_pause: Duration,
    pub tick_interval: Duration,
}

impl From<&SchedulerConfig> for TickSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            inter_run_pause: Duration::from_millis(config.inter_run_pause_ms),
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
        }
    }
}

impl Default for TickSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

/// `{success, processed?, error?}` returned by both entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResponse {
    pub fn processed(count: usize) -> Self {
        Self { success: true, processed: Some(count), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, processed: None, error: Some(error.into()) }
    }
}

/// What happened to one run during a tick.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// Due runs selected for this tick.
    pub due: usize,
    /// Runs that were handled (advanced, rescheduled, completed or failed).
    pub processed: usize,
    /// Runs skipped because they were locked or no longer active.
    pub skipped: usize,
    /// Runs whose processing returned an error.
    pub errored: usize,
    pub runs: Vec<RunReport>,
}

impl TickReport {
    pub fn to_response(&self) -> InvocationResponse {
        InvocationResponse::processed(self.processed)
    }
}

/// Handle to stop a running daemon loop.
#[derive(Clone, Default)]
pub struct SchedulerHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }
}

pub struct TickScheduler {
    machine: Arc<RunStateMachine>,
    runs: Arc<dyn RunRepository>,
    settings: TickSettings,
    handle: SchedulerHandle,
}

impl TickScheduler {
    pub fn new(machine: Arc<RunStateMachine>, settings: TickSettings) -> Self {
        let runs = machine.runs().clone();
        Self { machine, runs, settings, handle: SchedulerHandle::default() }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn settings(&self) -> &TickSettings {
        &self.settings
    }

    /// Batch entrypoint: process every due run, each on behalf of its owner.
    pub async fn process_due_runs(&self) -> DomainResult<TickReport> {
        let due = self.runs.list_due(Utc::now(), self.settings.batch_size).await?;
        let mut report = TickReport { due: due.len(), ..TickReport::default() };
        if due.is_empty() {
            return Ok(report);
        }
        info!(due = due.len(), "processing due runs");

        for (index, run) in due.iter().enumerate() {
            if index > 0 && !self.settings.inter_run_pause.is_zero() {
                tokio::time::sleep(self.settings.inter_run_pause).await;
            }

            match self.machine.process_run(run.id, &run.owner_id).await {
                Ok(outcome) => {
                    if outcome.was_processed() {
                        report.processed += 1;
                    } else {
                        report.skipped += 1;
                    }
                    report.runs.push(RunReport { run_id: run.id, outcome: Some(outcome), error: None });
                }
                Err(err) => {
                    error!(run_id = %run.id, error = %err, "run processing failed");
                    report.errored += 1;
                    report.runs.push(RunReport { run_id: run.id, outcome: None, error: Some(err.to_string()) });
                }
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            errored = report.errored,
            "tick complete"
        );
        Ok(report)
    }

    /// Single-run entrypoint, on behalf of an explicit principal.
    pub async fn process_one(&self, run_id: Uuid, principal: &str) -> DomainResult<RunOutcome> {
        self.machine.process_run(run_id, principal).await
    }

    /// Tick on a fixed interval until the handle is stopped.
    ///
    /// A failed tick is logged and the loop keeps going.
    pub async fn run_daemon(&self) {
        let mut timer = interval(self.settings.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.settings.tick_interval, "scheduler daemon started");

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = timer.tick() => {}
                () = self.handle.wake.notified() => {}
            }
            if self.handle.is_stop_requested() {
                break;
            }

            ticks += 1;
            let started = Instant::now();
            match self.process_due_runs().await {
                Ok(report) if report.due > 0 => {
                    info!(tick = ticks, processed = report.processed, elapsed_ms = started.elapsed().as_millis() as u64, "tick finished");
                }
                Ok(_) => {}
                Err(err) => warn!(tick = ticks, error = %err, "tick failed"),
            }
        }

        info!(ticks, "scheduler daemon stopped");
    }
}
