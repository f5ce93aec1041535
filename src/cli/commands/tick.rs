//! Scheduler CLI commands: `tick`, `process` and `daemon`.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::cli::context::AppContext;
use crate::cli::id_resolver::resolve_run_id;
use crate::cli::output::{list_table, output, short_id, CommandOutput};
use crate::services::{InvocationResponse, RunOutcome, SkipReason, TickReport, TickScheduler, TickSettings};

/// Result of one batch tick. JSON output is the bare invocation response.
#[derive(Debug, Serialize)]
pub struct TickOutput {
    pub response: InvocationResponse,
    pub report: TickReport,
}

impl CommandOutput for TickOutput {
    fn to_human(&self) -> String {
        if self.report.due == 0 {
            return "No runs due.".to_string();
        }

        let mut table = list_table(&["run", "result"]);
        for run in &self.report.runs {
            let result = match (&run.outcome, &run.error) {
                (Some(outcome), _) => describe_outcome(outcome),
                (None, Some(error)) => format!("error: {error}"),
                (None, None) => "-".to_string(),
            };
            table.add_row(vec![short_id(&run.run_id), result]);
        }

        format!(
            "Processed {} of {} due run(s) ({} skipped, {} errored):\n{table}",
            self.report.processed, self.report.due, self.report.skipped, self.report.errored
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.response).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessOutput {
    #[serde(flatten)]
    pub response: InvocationResponse,
    pub outcome: RunOutcome,
}

impl CommandOutput for ProcessOutput {
    fn to_human(&self) -> String {
        describe_outcome(&self.outcome)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Advanced { phase, step_number } => format!("advanced {phase} (step {step_number})"),
        RunOutcome::PhaseCompleted { steps_completed, early_stop: true } => {
            format!("phase 1 stopped early after {steps_completed} steps, entering phase 2")
        }
        RunOutcome::PhaseCompleted { steps_completed, early_stop: false } => {
            format!("phase 1 complete after {steps_completed} steps, entering phase 2")
        }
        RunOutcome::Completed { rounds_completed } => format!("completed after {rounds_completed} rounds"),
        RunOutcome::Rescheduled { error, next_run_at } => {
            format!("rescheduled for {} ({error})", next_run_at.format("%Y-%m-%d %H:%M:%S UTC"))
        }
        RunOutcome::Failed { reason } => format!("failed: {reason}"),
        RunOutcome::Skipped(SkipReason::Locked { until }) => {
            format!("skipped: locked until {}", until.format("%H:%M:%S UTC"))
        }
        RunOutcome::Skipped(SkipReason::LockContended) => "skipped: lock taken by another tick".to_string(),
        RunOutcome::Skipped(SkipReason::NotActive { status }) => format!("skipped: run is {status}"),
        RunOutcome::Skipped(SkipReason::LockLost) => "skipped: lock expired before commit".to_string(),
    }
}

pub async fn execute_tick(ctx: &AppContext, json_mode: bool) -> Result<()> {
    let report = ctx.scheduler().process_due_runs().await?;
    let response = report.to_response();
    output(&TickOutput { response, report }, json_mode);
    Ok(())
}

pub async fn execute_process(ctx: &AppContext, run_id: &str, principal: &str, json_mode: bool) -> Result<()> {
    let run_id = resolve_run_id(&ctx.pool, run_id).await?;
    let outcome = ctx.scheduler().process_one(run_id, principal).await?;
    let response = InvocationResponse::processed(usize::from(outcome.was_processed()));
    output(&ProcessOutput { response, outcome }, json_mode);
    Ok(())
}

pub async fn execute_daemon(ctx: &AppContext, interval_secs: Option<u64>) -> Result<()> {
    let mut settings = TickSettings::from(&ctx.config.scheduler);
    if let Some(secs) = interval_secs {
        settings.tick_interval = Duration::from_secs(secs.max(1));
    }
    let scheduler = TickScheduler::new(ctx.machine.clone(), settings);

    let handle = scheduler.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current tick");
            handle.stop();
        }
    });

    scheduler.run_daemon().await;
    Ok(())
}
