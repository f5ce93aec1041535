//! Step numbering under racing writers and overlapping ticks.

mod common;

use std::sync::Arc;

use futures::future::join_all;
use proptest::prelude::*;

use cartographer::domain::models::{GenerationMode, NewArtifact, NewRun, Run, RunPhase};
use cartographer::services::StepSequencer;

use common::Harness;

/// Numbers are 1..=n in order, and the run's counter matches the artifact count.
async fn assert_gap_free(h: &Harness, run: &Run) -> Vec<u32> {
    let steps = h.step_numbers(run).await;
    assert_eq!(steps, (1..=steps.len() as u32).collect::<Vec<_>>(), "gap or duplicate in {steps:?}");
    let current = h.reload(run).await;
    assert_eq!(current.steps_completed as usize, steps.len());
    assert!(current.in_progress_until.is_none());
    steps
}

#[tokio::test]
async fn test_concurrent_appends_get_unique_increasing_steps() {
    let h = Harness::new().await;
    let run = h.create_run(NewRun::new("alice", 50, 1)).await;

    const WRITERS: u32 = 8;
    // A writer can only lose to each other writer once, so WRITERS attempts always suffice
    let sequencer = Arc::new(StepSequencer::new(h.artifacts.clone(), WRITERS));

    let appends = (0..WRITERS).map(|i| {
        let sequencer = sequencer.clone();
        let draft = NewArtifact::new(run.id, RunPhase::Phase1, GenerationMode::Base, format!("writer {i}"));
        tokio::spawn(async move { sequencer.append(&draft).await })
    });

    let mut assigned: Vec<u32> = join_all(appends)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().step_number)
        .collect();
    assigned.sort_unstable();
    assert_eq!(assigned, (1..=WRITERS).collect::<Vec<_>>());

    assert_eq!(h.step_numbers(&run).await, (1..=WRITERS).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_overlapping_ticks_keep_numbering_consistent() {
    let h = Arc::new(Harness::new().await);
    let mut runs = Vec::new();
    for owner in ["alice", "bob", "carol"] {
        runs.push(h.create_run(NewRun::new(owner, 20, 1)).await);
    }

    for _ in 0..4 {
        let ticks = (0..3).map(|_| {
            let h = h.clone();
            async move { h.scheduler.process_due_runs().await }
        });
        for report in join_all(ticks).await {
            let report = report.unwrap();
            assert_eq!(report.errored, 0);
        }
    }

    for run in &runs {
        assert!(!assert_gap_free(&h, run).await.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: racing sequencer writers across several runs never share or skip a number
    #[test]
    fn prop_racing_writers_number_without_gaps(writers in 1u32..8, run_count in 1usize..4) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = Harness::new().await;
            let mut runs = Vec::new();
            for i in 0..run_count {
                runs.push(h.create_run(NewRun::new(format!("owner-{i}"), 50, 1)).await);
            }
            let sequencer = Arc::new(StepSequencer::new(h.artifacts.clone(), writers));

            let appends = (0..writers).flat_map(|i| runs.iter().map(move |run| (i, run.id))).map(|(i, run_id)| {
                let sequencer = sequencer.clone();
                let draft = NewArtifact::new(run_id, RunPhase::Phase1, GenerationMode::Base, format!("writer {i}"));
                tokio::spawn(async move { sequencer.append(&draft).await })
            });
            for joined in join_all(appends).await {
                joined.unwrap().unwrap();
            }

            for run in &runs {
                assert_eq!(h.step_numbers(run).await, (1..=writers).collect::<Vec<_>>());
            }
        });
    }

    /// Property: overlapping ticks advance every run and keep counters in step with artifacts
    #[test]
    fn prop_overlapping_ticks_keep_numbering(run_count in 1usize..4, overlap in 1usize..4, rounds in 1u32..4) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = Arc::new(Harness::new().await);
            let mut runs = Vec::new();
            for i in 0..run_count {
                runs.push(h.create_run(NewRun::new(format!("owner-{i}"), 50, 1)).await);
            }

            for _ in 0..rounds {
                let ticks = (0..overlap).map(|_| {
                    let h = h.clone();
                    tokio::spawn(async move { h.scheduler.process_due_runs().await })
                });
                for joined in join_all(ticks).await {
                    assert_eq!(joined.unwrap().unwrap().errored, 0);
                }
            }

            for run in &runs {
                let steps = assert_gap_free(&h, run).await;
                assert!(steps.len() as u32 >= rounds, "run advanced {} times in {rounds} rounds", steps.len());
            }
        });
    }
}
