//! Cartographer CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use cartographer::cli::commands::{run, tick};
use cartographer::cli::{handle_error, load_config, AppContext, Cli, Commands};
use cartographer::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run_cli(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;
    let ctx = AppContext::open(config).await?;

    match cli.command {
        Commands::Tick => tick::execute_tick(&ctx, cli.json).await,
        Commands::Process { run_id, principal } => tick::execute_process(&ctx, &run_id, &principal, cli.json).await,
        Commands::Daemon { interval_secs } => tick::execute_daemon(&ctx, interval_secs).await,
        Commands::Run(args) => run::execute(&ctx, args, cli.json).await,
    }
}
