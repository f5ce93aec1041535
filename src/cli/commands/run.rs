//! Run CLI commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::id_resolver::resolve_run_id;
use crate::cli::output::{list_table, output, render_list, short_id, truncate, CommandOutput};
use crate::domain::models::{Artifact, ModeStrategy, NewRun, Run, RunEvent, RunStatus};
use crate::domain::ports::RunFilter;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Create a new exploration run, due immediately
    Create {
        /// Principal that owns the run
        #[arg(short, long)]
        owner: String,
        /// Phase 1 step target
        #[arg(short, long, default_value = "10")]
        target_steps: u32,
        /// Phase 2 grounding round target
        #[arg(short, long, default_value = "3")]
        rounds: u32,
        /// Mode strategy (single, cycling)
        #[arg(short, long, default_value = "single")]
        strategy: String,
        /// Stop phase 1 early when recent steps converge
        #[arg(long)]
        early_stop: bool,
        /// Skip winner selection at the end of phase 1
        #[arg(long)]
        no_auto_select: bool,
        /// Run grounding rounds in research mode
        #[arg(long)]
        research_mode: bool,
        /// Seconds between phase 1 steps
        #[arg(long, default_value = "60")]
        phase1_delay_secs: u64,
        /// Seconds between phase 2 rounds
        #[arg(long, default_value = "120")]
        phase2_delay_secs: u64,
    },
    /// Show run details
    Show {
        /// Run ID (full UUID or unique prefix)
        id: String,
    },
    /// List runs
    List {
        /// Filter by status (active, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by owner
        #[arg(short, long)]
        owner: Option<String>,
        /// Maximum number of runs to display
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
    /// Show the event log of a run
    Events {
        /// Run ID (full UUID or unique prefix)
        id: String,
        /// Only the most recent N events
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// List the artifacts of a run in step order
    Artifacts {
        /// Run ID (full UUID or unique prefix)
        id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run: Run,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let run = &self.run;
        let mut lines = vec![
            format!("Run: {}", run.id),
            format!("Owner: {}", run.owner_id),
            format!("Status: {}", run.status),
            format!("Phase: {}", run.phase),
            format!("Steps: {}/{} ({})", run.steps_completed, run.target_steps, run.phase1.strategy.as_str()),
            format!("Rounds: {}/{}", run.rounds_completed, run.rounds_target),
        ];

        if let Some(next) = run.next_run_at {
            lines.push(format!("Next run: {}", next.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(last) = run.last_run_at {
            lines.push(format!("Last run: {}", last.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(until) = run.in_progress_until {
            lines.push(format!("Locked until: {}", until.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(error) = &run.last_error {
            lines.push(format!("Last error: {error}"));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.run).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct RunListOutput {
    pub runs: Vec<Run>,
    pub total: usize,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "owner", "status", "phase", "steps", "rounds", "next run"]);
        for run in &self.runs {
            table.add_row(vec![
                short_id(&run.id),
                truncate(&run.owner_id, 16),
                run.status.to_string(),
                run.phase.to_string(),
                format!("{}/{}", run.steps_completed, run.target_steps),
                format!("{}/{}", run.rounds_completed, run.rounds_target),
                run.next_run_at.map_or_else(|| "-".to_string(), |t| t.format("%m-%d %H:%M:%S").to_string()),
            ]);
        }
        render_list("run", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct EventListOutput {
    pub events: Vec<RunEvent>,
    pub total: usize,
}

impl CommandOutput for EventListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["time", "level", "message"]);
        for event in &self.events {
            table.add_row(vec![
                event.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                event.level.as_str().to_string(),
                truncate(&event.message, 80),
            ]);
        }
        render_list("event", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ArtifactListOutput {
    pub artifacts: Vec<Artifact>,
    pub total: usize,
}

impl CommandOutput for ArtifactListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["step", "phase", "mode", "valid", "novelty", "support", "body"]);
        let score = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
        for artifact in &self.artifacts {
            table.add_row(vec![
                artifact.step_number.to_string(),
                artifact.phase.to_string(),
                artifact.mode.to_string(),
                String::from(if artifact.is_valid { "yes" } else { "no" }),
                score(artifact.scores.novelty),
                score(artifact.scores.support()),
                truncate(&artifact.body.replace('\n', " "), 60),
            ]);
        }
        render_list("artifact", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(ctx: &AppContext, args: RunArgs, json_mode: bool) -> Result<()> {
    match args.command {
        RunCommands::Create {
            owner,
            target_steps,
            rounds,
            strategy,
            early_stop,
            no_auto_select,
            research_mode,
            phase1_delay_secs,
            phase2_delay_secs,
        } => {
            let strategy =
                ModeStrategy::from_str(&strategy).ok_or_else(|| anyhow!("Invalid strategy: {strategy}"))?;
            let new = NewRun::new(owner, target_steps, rounds)
                .with_strategy(strategy)
                .with_early_stop(early_stop)
                .with_auto_select(!no_auto_select)
                .with_research_mode(research_mode)
                .with_delays(phase1_delay_secs, phase2_delay_secs);

            let run = ctx.machine.create_run(new).await.context("Failed to create run")?;
            output(&RunOutput { run }, json_mode);
        }
        RunCommands::Show { id } => {
            let run_id = resolve_run_id(&ctx.pool, &id).await?;
            let run = ctx.runs.get(run_id).await?.ok_or_else(|| anyhow!("Run {run_id} not found"))?;
            output(&RunOutput { run }, json_mode);
        }
        RunCommands::List { status, owner, limit } => {
            let status = status
                .map(|s| RunStatus::from_str(&s).ok_or_else(|| anyhow!("Invalid status: {s}")))
                .transpose()?;
            let runs = ctx.runs.list(RunFilter { status, owner_id: owner, limit: Some(limit) }).await?;
            let total = runs.len();
            output(&RunListOutput { runs, total }, json_mode);
        }
        RunCommands::Events { id, limit } => {
            let run_id = resolve_run_id(&ctx.pool, &id).await?;
            let events = ctx.events.list_by_run(run_id, limit).await?;
            let total = events.len();
            output(&EventListOutput { events, total }, json_mode);
        }
        RunCommands::Artifacts { id } => {
            let run_id = resolve_run_id(&ctx.pool, &id).await?;
            let artifacts = ctx.artifacts.list_by_run(run_id).await?;
            let total = artifacts.len();
            output(&ArtifactListOutput { artifacts, total }, json_mode);
        }
    }

    Ok(())
}
