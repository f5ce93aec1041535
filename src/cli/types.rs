//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "cartographer")]
#[command(about = "Cartographer - unattended exploration run orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .cartographer/
    #[arg(short, long, global = true, env = "CARTOGRAPHER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every due run once (one scheduler tick)
    Tick,

    /// Advance a single run on behalf of a principal
    Process {
        /// Run ID (full UUID or unique prefix)
        run_id: String,

        /// Principal requesting the work; must own the run
        #[arg(short, long)]
        principal: String,
    },

    /// Tick on a fixed interval until interrupted
    Daemon {
        /// Seconds between ticks (defaults to scheduler.tick_interval_secs)
        #[arg(short, long)]
        interval_secs: Option<u64>,
    },

    /// Run management commands
    Run(RunArgs),
}
