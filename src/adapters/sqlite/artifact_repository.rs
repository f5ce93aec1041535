//! SQLite implementation of the ArtifactRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Artifact, ArtifactScores, GenerationMode, RunPhase};
use crate::domain::ports::ArtifactRepository;

const ARTIFACT_COLUMNS: &str =
    "id, run_id, step_number, phase, body, mode, novelty, depth, coherence, testability, is_valid, created_at";

#[derive(Clone)]
pub struct SqliteArtifactRepository {
    pool: SqlitePool,
}

impl SqliteArtifactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRepository for SqliteArtifactRepository {
    async fn max_step_number(&self, run_id: Uuid) -> DomainResult<Option<u32>> {
        let (max,): (Option<i64>,) = sqlx::query_as("SELECT MAX(step_number) FROM artifacts WHERE run_id = ?")
            .bind(run_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(max.map(|m| m as u32))
    }

    async fn insert(&self, artifact: &Artifact) -> DomainResult<()> {
        let result = sqlx::query(&format!(
            "INSERT INTO artifacts ({ARTIFACT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(artifact.id.to_string())
        .bind(artifact.run_id.to_string())
        .bind(i64::from(artifact.step_number))
        .bind(artifact.phase.as_str())
        .bind(&artifact.body)
        .bind(artifact.mode.as_str())
        .bind(artifact.scores.novelty)
        .bind(artifact.scores.depth)
        .bind(artifact.scores.coherence)
        .bind(artifact.scores.testability)
        .bind(artifact.is_valid)
        .bind(format_datetime(artifact.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DomainError::ConcurrencyConflict {
                entity: "artifact".to_string(),
                id: format!("{}#{}", artifact.run_id, artifact.step_number),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_recent_valid(&self, run_id: Uuid, phase: RunPhase, limit: u32) -> DomainResult<Vec<Artifact>> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM (
                 SELECT {ARTIFACT_COLUMNS} FROM artifacts
                 WHERE run_id = ? AND phase = ? AND is_valid = 1
                 ORDER BY step_number DESC
                 LIMIT ?
             ) ORDER BY step_number ASC"
        ))
        .bind(run_id.to_string())
        .bind(phase.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Artifact::try_from).collect()
    }

    async fn list_by_run(&self, run_id: Uuid) -> DomainResult<Vec<Artifact>> {
        let rows: Vec<ArtifactRow> =
            sqlx::query_as(&format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE run_id = ? ORDER BY step_number"))
                .bind(run_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Artifact::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    run_id: String,
    step_number: i64,
    phase: String,
    body: String,
    mode: String,
    novelty: Option<f64>,
    depth: Option<f64>,
    coherence: Option<f64>,
    testability: Option<f64>,
    is_valid: bool,
    created_at: String,
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = DomainError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        let phase = RunPhase::from_str(&row.phase)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid phase: {}", row.phase)))?;
        let mode = GenerationMode::from_str(&row.mode)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid mode: {}", row.mode)))?;

        Ok(Artifact {
            id: parse_uuid(&row.id)?,
            run_id: parse_uuid(&row.run_id)?,
            step_number: row.step_number as u32,
            phase,
            body: row.body,
            mode,
            scores: ArtifactScores {
                novelty: row.novelty,
                depth: row.depth,
                coherence: row.coherence,
                testability: row.testability,
            },
            is_valid: row.is_valid,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteRunRepository};
    use crate::domain::models::{NewArtifact, NewRun, Run};
    use crate::domain::ports::RunRepository;

    async fn setup() -> (SqliteArtifactRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let run = Run::create(NewRun::new("alice", 10, 2)).unwrap();
        SqliteRunRepository::new(pool.clone()).create(&run).await.unwrap();
        (SqliteArtifactRepository::new(pool), run.id)
    }

    fn artifact(run_id: Uuid, step: u32, phase: RunPhase, body: &str) -> Artifact {
        NewArtifact::new(run_id, phase, GenerationMode::Base, body).numbered(step)
    }

    #[tokio::test]
    async fn test_max_step_number() {
        let (repo, run_id) = setup().await;
        assert_eq!(repo.max_step_number(run_id).await.unwrap(), None);

        repo.insert(&artifact(run_id, 1, RunPhase::Phase1, "one")).await.unwrap();
        repo.insert(&artifact(run_id, 2, RunPhase::Phase1, "two")).await.unwrap();
        assert_eq!(repo.max_step_number(run_id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_step_is_concurrency_conflict() {
        let (repo, run_id) = setup().await;
        repo.insert(&artifact(run_id, 1, RunPhase::Phase1, "first")).await.unwrap();

        let err = repo.insert(&artifact(run_id, 1, RunPhase::Phase1, "racer")).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_a_conflict() {
        let (repo, _) = setup().await;
        let err = repo.insert(&artifact(Uuid::new_v4(), 1, RunPhase::Phase1, "orphan")).await.unwrap_err();
        assert!(matches!(err, DomainError::DatabaseError(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_list_recent_valid_returns_tail_in_step_order() {
        let (repo, run_id) = setup().await;
        for step in 1..=5 {
            let mut a = artifact(run_id, step, RunPhase::Phase1, &format!("step {step}"));
            a.is_valid = step != 4;
            repo.insert(&a).await.unwrap();
        }
        repo.insert(&artifact(run_id, 6, RunPhase::Phase2, "grounding")).await.unwrap();

        let recent = repo.list_recent_valid(run_id, RunPhase::Phase1, 3).await.unwrap();
        let steps: Vec<u32> = recent.iter().map(|a| a.step_number).collect();
        assert_eq!(steps, vec![2, 3, 5]);

        let all = repo.list_by_run(run_id).await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all.last().unwrap().phase, RunPhase::Phase2);
    }

    #[tokio::test]
    async fn test_scores_round_trip() {
        let (repo, run_id) = setup().await;
        let scores = ArtifactScores { novelty: Some(8.0), depth: None, coherence: Some(6.5), testability: Some(3.0) };
        let a = NewArtifact::new(run_id, RunPhase::Phase1, GenerationMode::Adversarial, "critique")
            .with_scores(scores.clone())
            .numbered(1);
        repo.insert(&a).await.unwrap();

        let stored = &repo.list_by_run(run_id).await.unwrap()[0];
        assert_eq!(stored.scores, scores);
        assert_eq!(stored.mode, GenerationMode::Adversarial);
    }
}
