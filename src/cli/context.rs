//! Per-invocation wiring: config, database pool, repositories and services.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::generators::create_generator;
use crate::adapters::sqlite::{
    database_url, initialize_database, PoolConfig, SqliteArtifactRepository, SqliteRunEventRepository,
    SqliteRunRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{ArtifactRepository, RunEventRepository, RunRepository};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{OrchestratorSettings, RunStateMachine, TickScheduler, TickSettings};

/// Load configuration from an explicit file, or the `.cartographer/` hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub runs: Arc<dyn RunRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
    pub events: Arc<dyn RunEventRepository>,
    pub machine: Arc<RunStateMachine>,
}

impl AppContext {
    /// Open the database (applying migrations) and build the state machine.
    pub async fn open(config: Config) -> Result<Self> {
        let url = database_url(&config.database.path);
        let pool_config = PoolConfig::default().with_max_connections(config.database.max_connections);
        let pool = initialize_database(&url, Some(pool_config))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let runs: Arc<dyn RunRepository> = Arc::new(SqliteRunRepository::new(pool.clone()));
        let artifacts: Arc<dyn ArtifactRepository> = Arc::new(SqliteArtifactRepository::new(pool.clone()));
        let events: Arc<dyn RunEventRepository> = Arc::new(SqliteRunEventRepository::new(pool.clone()));
        let generator = create_generator(&config.generation).context("Failed to build generator")?;

        let machine = Arc::new(RunStateMachine::new(
            runs.clone(),
            artifacts.clone(),
            events.clone(),
            generator,
            OrchestratorSettings::from(&config),
        ));

        Ok(Self { config, pool, runs, artifacts, events, machine })
    }

    pub fn scheduler(&self) -> TickScheduler {
        TickScheduler::new(self.machine.clone(), TickSettings::from(&self.config.scheduler))
    }
}
