//! Textual convergence detection.
//!
//! Tracks Jaccard similarity between consecutive artifacts and derives a
//! stability and novelty signal from the rolling history. The orchestrator's
//! per-tick early-stop check uses the cheaper [`early_stop_check`] over the
//! last three artifacts; the full [`ConvergenceDetector`] report is attached
//! to the phase transition event.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::models::ConvergenceConfig;

/// Number of trailing artifacts examined by the early-stop check.
pub const EARLY_STOP_SAMPLE: usize = 3;

/// Lower-case, strip punctuation, split on whitespace, drop tokens of length <= 2.
pub fn tokenize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|, or 0 when both sets are empty.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard_similarity(&tokenize(a), &tokenize(b))
}

/// Mean Jaccard similarity over every unordered pair of texts.
///
/// Returns 0 for fewer than two texts.
pub fn pairwise_average_similarity(texts: &[&str]) -> f64 {
    let token_sets: Vec<HashSet<String>> = texts.iter().map(|t| tokenize(t)).collect();
    let mut total = 0.0;
    let mut pairs = 0usize;

    for i in 0..token_sets.len() {
        for j in (i + 1)..token_sets.len() {
            total += jaccard_similarity(&token_sets[i], &token_sets[j]);
            pairs += 1;
        }
    }

    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

/// Result of the per-tick early-stop check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EarlyStopCheck {
    /// Pairwise average over the sample; `None` when fewer than three artifacts exist.
    pub average_similarity: Option<f64>,
    pub triggered: bool,
}

/// Early-stop check over the most recent valid artifacts (oldest first).
///
/// Only the last [`EARLY_STOP_SAMPLE`] texts are considered.
pub fn early_stop_check(recent: &[&str], threshold: f64) -> EarlyStopCheck {
    if recent.len() < EARLY_STOP_SAMPLE {
        return EarlyStopCheck { average_similarity: None, triggered: false };
    }
    let sample = &recent[recent.len() - EARLY_STOP_SAMPLE..];
    let average = pairwise_average_similarity(sample);
    EarlyStopCheck { average_similarity: Some(average), triggered: average >= threshold }
}

/// Snapshot of the detector state after the latest observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    /// Artifacts observed so far.
    pub iterations: usize,
    /// Similarity between the last two artifacts (0 with fewer than two).
    pub similarity: f64,
    pub windowed_mean: f64,
    pub windowed_variance: f64,
    /// `max(0, 1 - sqrt(variance))` over the window.
    pub stability: f64,
    /// `max(0, mean(last 2) - mean(earlier))`.
    pub novelty_decrease: f64,
    pub is_converged: bool,
}

/// Rolling convergence detector over an ordered artifact stream.
#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    config: ConvergenceConfig,
    previous: Option<HashSet<String>>,
    history: Vec<f64>,
    iterations: usize,
}

impl ConvergenceDetector {
    pub fn new(config: ConvergenceConfig) -> Self {
        Self { config, previous: None, history: Vec::new(), iterations: 0 }
    }

    /// Feed the next artifact and return the updated report.
    pub fn observe(&mut self, text: &str) -> ConvergenceReport {
        let tokens = tokenize(text);
        if let Some(previous) = &self.previous {
            self.history.push(jaccard_similarity(previous, &tokens));
        }
        self.previous = Some(tokens);
        self.iterations += 1;
        self.report()
    }

    pub fn report(&self) -> ConvergenceReport {
        let Some(&latest) = self.history.last() else {
            return ConvergenceReport {
                iterations: self.iterations,
                similarity: 0.0,
                windowed_mean: 0.0,
                windowed_variance: 0.0,
                stability: 0.0,
                novelty_decrease: 0.0,
                is_converged: false,
            };
        };

        let window_size = self.config.window_size.max(1);
        let window = &self.history[self.history.len().saturating_sub(window_size)..];
        let windowed_mean = mean(window);
        let windowed_variance =
            window.iter().map(|s| (s - windowed_mean).powi(2)).sum::<f64>() / window.len() as f64;
        let stability = (1.0 - windowed_variance.sqrt()).max(0.0);

        let split = self.history.len().saturating_sub(2);
        let (earlier, recent) = self.history.split_at(split);
        let novelty_decrease = if earlier.is_empty() {
            0.0
        } else {
            (mean(recent) - mean(earlier)).max(0.0)
        };

        let is_converged = self.iterations >= self.config.min_iterations
            && latest >= self.config.jaccard_threshold
            && stability >= self.config.stability_threshold
            && novelty_decrease <= self.config.novelty_threshold;

        ConvergenceReport {
            iterations: self.iterations,
            similarity: latest,
            windowed_mean,
            windowed_variance,
            stability,
            novelty_decrease,
            is_converged,
        }
    }
}

/// Run a fresh detector over a whole sequence.
pub fn analyze<'a, I>(texts: I, config: &ConvergenceConfig) -> ConvergenceReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut detector = ConvergenceDetector::new(config.clone());
    for text in texts {
        detector.observe(text);
    }
    detector.report()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
