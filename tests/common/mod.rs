//! Common test utilities for integration tests
//!
//! Builds a state machine and tick scheduler over a migrated in-memory
//! SQLite pool and a scripted mock generator.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use cartographer::adapters::generators::{MockGenerator, MockResponse};
use cartographer::adapters::sqlite::{
    create_migrated_test_pool, SqliteArtifactRepository, SqliteRunEventRepository, SqliteRunRepository,
};
use cartographer::domain::models::{ArtifactScores, NewRun, Run};
use cartographer::domain::ports::{ArtifactRepository, RunEventRepository, RunRepository};
use cartographer::services::{OrchestratorSettings, RunStateMachine, TickScheduler, TickSettings};

pub struct Harness {
    pub pool: SqlitePool,
    pub runs: Arc<dyn RunRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
    pub events: Arc<dyn RunEventRepository>,
    pub generator: Arc<MockGenerator>,
    pub machine: Arc<RunStateMachine>,
    pub scheduler: TickScheduler,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(MockGenerator::new(), test_settings()).await
    }

    pub async fn with(generator: MockGenerator, settings: OrchestratorSettings) -> Self {
        Self::with_artifacts(generator, settings, |sqlite| sqlite).await
    }

    /// Like [`Harness::with`], letting the test wrap the SQLite artifact store.
    pub async fn with_artifacts(
        generator: MockGenerator,
        settings: OrchestratorSettings,
        wrap: impl FnOnce(Arc<dyn ArtifactRepository>) -> Arc<dyn ArtifactRepository>,
    ) -> Self {
        let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
        let runs: Arc<dyn RunRepository> = Arc::new(SqliteRunRepository::new(pool.clone()));
        let artifacts = wrap(Arc::new(SqliteArtifactRepository::new(pool.clone())));
        let events: Arc<dyn RunEventRepository> = Arc::new(SqliteRunEventRepository::new(pool.clone()));
        let generator = Arc::new(generator);

        let machine = Arc::new(RunStateMachine::new(
            runs.clone(),
            artifacts.clone(),
            events.clone(),
            generator.clone(),
            settings,
        ));
        let scheduler = TickScheduler::new(machine.clone(), tick_settings());

        Self { pool, runs, artifacts, events, generator, machine, scheduler }
    }

    /// Create a run with zero delays so every tick finds it due.
    pub async fn create_run(&self, new: NewRun) -> Run {
        self.machine.create_run(new.with_delays(0, 0)).await.expect("Failed to create run")
    }

    pub async fn reload(&self, run: &Run) -> Run {
        self.runs.get(run.id).await.expect("Failed to load run").expect("run missing")
    }

    pub async fn step_numbers(&self, run: &Run) -> Vec<u32> {
        self.artifacts
            .list_by_run(run.id)
            .await
            .expect("Failed to list artifacts")
            .iter()
            .map(|a| a.step_number)
            .collect()
    }

    pub async fn event_messages(&self, run: &Run) -> Vec<String> {
        self.events
            .list_by_run(run.id, None)
            .await
            .expect("Failed to list events")
            .into_iter()
            .map(|e| e.message)
            .collect()
    }
}

/// Default settings with short timeouts and backoffs suitable for tests.
pub fn test_settings() -> OrchestratorSettings {
    let mut settings = OrchestratorSettings::default();
    settings.timeouts.single_step = Duration::from_secs(5);
    settings.timeouts.multi_agent = Duration::from_secs(5);
    settings.lock_ceiling = Duration::from_secs(30);
    settings
}

pub fn tick_settings() -> TickSettings {
    TickSettings { batch_size: 5, inter_run_pause: Duration::ZERO, tick_interval: Duration::from_millis(20) }
}

pub fn scored(novelty: f64, depth: f64) -> ArtifactScores {
    ArtifactScores { novelty: Some(novelty), depth: Some(depth), ..ArtifactScores::default() }
}

pub fn success(body: &str) -> MockResponse {
    MockResponse::success(body)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
