//! Job Complexity Index (JCI) scoring engine.
//!
//! Converts sparse survey task-rating rows into a normalized complexity
//! score per occupation:
//!
//! 1. Filter to importance ratings above threshold, unsuppressed, with
//!    well-formed SOC codes.
//! 2. Deduplicate the survivors into a binary occupation×task incidence
//!    graph.
//! 3. Run a fixed number of mutual mean-score rounds (occupations and
//!    tasks reinforcing each other).
//! 4. Min-max normalize the occupation scores to `[0, 1]`.
//!
//! A degree-based fallback ([`ScoringMethod::TaskCount`]) produces
//! scores in the same range through the same interface.

pub mod graph;

use std::collections::{BTreeMap, BTreeSet};

use jobatlas_shared::{JobAtlasError, Result, TaskRating, is_soc_code};

use crate::graph::IncidenceGraph;

/// Scale identifier marking an importance measurement.
const IMPORTANCE_SCALE: &str = "IM";

/// Ratings at or below this importance value do not establish relevance.
const IMPORTANCE_THRESHOLD: f64 = 2.5;

/// Fixed number of mutual-update rounds. There is no convergence check;
/// the iteration count bounds the computation deterministically.
const ITERATION_ROUNDS: usize = 20;

/// How occupation complexity scores are derived from task ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMethod {
    /// Bipartite mutual-reinforcement iteration (the default).
    Iterative,
    /// Deterministic proxy: qualifying-task count per occupation.
    TaskCount,
}

impl std::str::FromStr for ScoringMethod {
    type Err = JobAtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "iterative" => Ok(ScoringMethod::Iterative),
            "task-count" => Ok(ScoringMethod::TaskCount),
            other => Err(JobAtlasError::config(format!(
                "unknown scoring method '{other}': expected 'iterative' or 'task-count'"
            ))),
        }
    }
}

/// Compute normalized complexity scores for every occupation present in
/// the survey data.
///
/// Returns an empty mapping when no ratings survive the filter; the
/// caller treats that as "no task-derived complexity available" and
/// falls back to the GDP proxy, not as an error.
pub fn compute_scores(
    ratings: &[TaskRating],
    method: ScoringMethod,
) -> BTreeMap<String, f64> {
    let pairs = qualifying_pairs(ratings);
    if pairs.is_empty() {
        tracing::warn!("no qualifying task ratings; returning empty score map");
        return BTreeMap::new();
    }

    let graph = IncidenceGraph::from_pairs(&pairs);
    tracing::info!(
        occupations = graph.occupation_count(),
        tasks = graph.task_count(),
        ?method,
        "scoring occupation-task graph"
    );

    let raw: Vec<f64> = match method {
        ScoringMethod::Iterative => graph.propagate(ITERATION_ROUNDS),
        ScoringMethod::TaskCount => (0..graph.occupation_count())
            .map(|o| graph.occupation_degree(o) as f64)
            .collect(),
    };

    let normalized = min_max_normalize(&raw);
    graph
        .occupations()
        .iter()
        .cloned()
        .zip(normalized)
        .collect()
}

/// Filter ratings to the qualifying set and deduplicate into binary
/// `(occupation, task)` pairs.
///
/// A rating qualifies when its scale is the importance scale, it is not
/// flagged for suppression, and its value exceeds the threshold. Codes
/// are reduced to their base form (any `.XX` detail suffix stripped);
/// only 7-character `XX-XXXX` codes participate.
pub fn qualifying_pairs(ratings: &[TaskRating]) -> BTreeSet<(String, String)> {
    let mut pairs = BTreeSet::new();
    for rating in ratings {
        if rating.scale_id.trim() != IMPORTANCE_SCALE || rating.suppress {
            continue;
        }
        let Some(value) = rating.data_value else {
            continue;
        };
        if value <= IMPORTANCE_THRESHOLD {
            continue;
        }

        let base = rating
            .occupation_code
            .trim()
            .split('.')
            .next()
            .unwrap_or("");
        if !is_soc_code(base) {
            continue;
        }

        pairs.insert((base.to_owned(), rating.task_id.trim().to_owned()));
    }
    pairs
}

/// Min-max normalize to `[0, 1]` with 4-decimal rounding. A degenerate
/// distribution (`max == min`) maps uniformly to 0.5.
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let Some(min) = values.iter().cloned().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().cloned().fold(min, f64::max);

    if max > min {
        let range = max - min;
        values.iter().map(|v| round4((v - min) / range)).collect()
    } else {
        vec![0.5; values.len()]
    }
}

/// Round to 4 decimal digits.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
