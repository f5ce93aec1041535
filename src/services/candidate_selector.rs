//! Winner selection over scored phase 1 artifacts.
//!
//! Pure and deterministic: the caller decides what to log or persist.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{Artifact, SelectionConfig};

/// An artifact eligible for ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub artifact_id: Uuid,
    pub step_number: u32,
    pub novelty: f64,
    /// Depth when present, otherwise coherence.
    pub support: f64,
    pub testability: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// Build a candidate from an artifact; `None` when novelty or support is missing.
    pub fn from_artifact(artifact: &Artifact) -> Option<Self> {
        Some(Self {
            artifact_id: artifact.id,
            step_number: artifact.step_number,
            novelty: artifact.scores.novelty?,
            support: artifact.scores.support()?,
            testability: artifact.scores.testability,
            created_at: artifact.created_at,
        })
    }
}

/// A candidate that cleared the floor, with its composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    Winner {
        winner: ScoredCandidate,
        /// Candidates that cleared the floor.
        qualified: usize,
        considered: usize,
    },
    Skipped {
        reason: String,
        considered: usize,
    },
}

impl Selection {
    pub fn winner(&self) -> Option<&ScoredCandidate> {
        match self {
            Self::Winner { winner, .. } => Some(winner),
            Self::Skipped { .. } => None,
        }
    }
}

/// Weights and floors for ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub novelty_weight: f64,
    pub support_weight: f64,
    pub novelty_floor: f64,
    pub support_floor: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from(&SelectionConfig::default())
    }
}

impl From<&SelectionConfig> for SelectionPolicy {
    fn from(config: &SelectionConfig) -> Self {
        Self {
            novelty_weight: config.novelty_weight,
            support_weight: config.support_weight,
            novelty_floor: config.novelty_floor,
            support_floor: config.support_floor,
        }
    }
}

impl SelectionPolicy {
    pub fn score(&self, candidate: &Candidate) -> f64 {
        self.novelty_weight * candidate.novelty + self.support_weight * candidate.support
    }

    pub fn clears_floor(&self, candidate: &Candidate) -> bool {
        candidate.novelty >= self.novelty_floor && candidate.support >= self.support_floor
    }
}

/// Ranking: higher score, then higher testability (absent counts as 0),
/// then older creation time, then lower step number.
fn rank(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            let ta = a.candidate.testability.unwrap_or(0.0);
            let tb = b.candidate.testability.unwrap_or(0.0);
            tb.total_cmp(&ta)
        })
        .then_with(|| a.candidate.created_at.cmp(&b.candidate.created_at))
        .then_with(|| a.candidate.step_number.cmp(&b.candidate.step_number))
}

/// Pick a winner among candidates.
pub fn select_winner(candidates: &[Candidate], policy: &SelectionPolicy) -> Selection {
    let considered = candidates.len();
    if considered == 0 {
        return Selection::Skipped { reason: "no scored candidates in window".to_string(), considered };
    }

    let mut qualified: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| policy.clears_floor(c))
        .map(|c| ScoredCandidate { candidate: c.clone(), score: policy.score(c) })
        .collect();

    if qualified.is_empty() {
        return Selection::Skipped {
            reason: format!(
                "no candidate cleared the floor (novelty >= {}, support >= {})",
                policy.novelty_floor, policy.support_floor
            ),
            considered,
        };
    }

    qualified.sort_by(rank);
    let count = qualified.len();
    let winner = qualified.swap_remove(0);
    Selection::Winner { winner, qualified: count, considered }
}

/// Convenience wrapper: build candidates from artifacts, then select.
pub fn select_from_artifacts(artifacts: &[Artifact], policy: &SelectionPolicy) -> Selection {
    let candidates: Vec<Candidate> = artifacts
        .iter()
        .filter(|a| a.is_valid)
        .filter_map(Candidate::from_artifact)
        .collect();
    select_winner(&candidates, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candidate(step: u32, novelty: f64, support: f64, testability: Option<f64>, offset_secs: i64) -> Candidate {
        Candidate {
            artifact_id: Uuid::new_v4(),
            step_number: step,
            novelty,
            support,
            testability,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_floor_excludes_low_novelty() {
        let candidates = vec![candidate(1, 5.0, 9.0, None, 0), candidate(2, 8.0, 6.0, None, 10)];
        let selection = select_winner(&candidates, &SelectionPolicy::default());
        let winner = selection.winner().expect("second candidate should qualify");
        assert_eq!(winner.candidate.step_number, 2);
        assert!((winner.score - (0.7 * 8.0 + 0.3 * 6.0)).abs() < 1e-12);
        assert!(matches!(selection, Selection::Winner { qualified: 1, considered: 2, .. }));
    }

    #[test]
    fn test_tie_broken_by_testability_then_age() {
        let policy = SelectionPolicy::default();

        let candidates = vec![candidate(1, 8.0, 6.0, Some(4.0), 0), candidate(2, 8.0, 6.0, Some(7.0), 10)];
        assert_eq!(select_winner(&candidates, &policy).winner().unwrap().candidate.step_number, 2);

        let candidates = vec![candidate(5, 8.0, 6.0, Some(7.0), 30), candidate(3, 8.0, 6.0, Some(7.0), 10)];
        assert_eq!(select_winner(&candidates, &policy).winner().unwrap().candidate.step_number, 3);
    }

    #[test]
    fn test_missing_testability_counts_as_zero() {
        let candidates = vec![candidate(1, 8.0, 6.0, None, 0), candidate(2, 8.0, 6.0, Some(1.0), 10)];
        let selection = select_winner(&candidates, &SelectionPolicy::default());
        assert_eq!(selection.winner().unwrap().candidate.step_number, 2);
    }

    #[test]
    fn test_higher_score_beats_testability() {
        let candidates = vec![candidate(1, 9.0, 9.0, None, 0), candidate(2, 7.0, 6.0, Some(10.0), 0)];
        let selection = select_winner(&candidates, &SelectionPolicy::default());
        assert_eq!(selection.winner().unwrap().candidate.step_number, 1);
    }

    #[test]
    fn test_skips_when_nothing_clears_floor() {
        let candidates = vec![candidate(1, 5.9, 9.0, None, 0), candidate(2, 9.0, 4.9, None, 0)];
        match select_winner(&candidates, &SelectionPolicy::default()) {
            Selection::Skipped { reason, considered } => {
                assert_eq!(considered, 2);
                assert!(reason.contains("floor"));
            }
            other => panic!("expected skip, got {other:?}"),
        }

        assert!(matches!(
            select_winner(&[], &SelectionPolicy::default()),
            Selection::Skipped { considered: 0, .. }
        ));
    }

    #[test]
    fn test_selection_is_order_independent() {
        let a = candidate(1, 8.0, 7.0, Some(3.0), 0);
        let b = candidate(2, 8.0, 7.0, Some(3.0), 5);
        let c = candidate(3, 6.5, 5.5, None, 1);
        let policy = SelectionPolicy::default();
        let forward = select_winner(&[a.clone(), b.clone(), c.clone()], &policy);
        let reversed = select_winner(&[c, b, a], &policy);
        assert_eq!(forward.winner().unwrap().candidate.step_number, 1);
        assert_eq!(reversed.winner().unwrap().candidate.step_number, 1);
    }
}
