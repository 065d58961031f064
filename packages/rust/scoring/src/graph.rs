//! Sparse bipartite occupation-task incidence graph.
//!
//! The incidence relation is stored as compressed adjacency index lists
//! (one offsets/indices pair per side), never as a dense matrix: with
//! ~900 occupations and ~18k survey tasks a dense layout would waste
//! O(|O|·|T|) memory for a relation that is overwhelmingly empty.

use std::collections::BTreeSet;

/// Binary occupation×task incidence graph in compressed form.
///
/// Node identities are the sorted, deduplicated occupation codes and
/// task ids that appear in at least one surviving pair.
#[derive(Debug)]
pub struct IncidenceGraph {
    occupations: Vec<String>,
    tasks: Vec<String>,
    /// Adjacency of occupation `o`: `occ_tasks[occ_offsets[o]..occ_offsets[o + 1]]`.
    occ_offsets: Vec<usize>,
    occ_tasks: Vec<u32>,
    /// Adjacency of task `t`: `task_occs[task_offsets[t]..task_offsets[t + 1]]`.
    task_offsets: Vec<usize>,
    task_occs: Vec<u32>,
}

impl IncidenceGraph {
    /// Build the graph from deduplicated `(occupation_code, task_id)` pairs.
    pub fn from_pairs(pairs: &BTreeSet<(String, String)>) -> Self {
        let occupations: Vec<String> = pairs
            .iter()
            .map(|(o, _)| o.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let tasks: Vec<String> = pairs
            .iter()
            .map(|(_, t)| t.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let occ_index = |code: &str| occupations.binary_search_by(|c| c.as_str().cmp(code));
        let task_index = |id: &str| tasks.binary_search_by(|t| t.as_str().cmp(id));

        // Degree counts, then prefix sums into offsets.
        let mut occ_degrees = vec![0usize; occupations.len()];
        let mut task_degrees = vec![0usize; tasks.len()];
        for (o, t) in pairs {
            if let (Ok(oi), Ok(ti)) = (occ_index(o), task_index(t)) {
                occ_degrees[oi] += 1;
                task_degrees[ti] += 1;
            }
        }

        let occ_offsets = prefix_sums(&occ_degrees);
        let task_offsets = prefix_sums(&task_degrees);

        let mut occ_tasks = vec![0u32; pairs.len()];
        let mut task_occs = vec![0u32; pairs.len()];
        let mut occ_fill = occ_offsets.clone();
        let mut task_fill = task_offsets.clone();
        for (o, t) in pairs {
            if let (Ok(oi), Ok(ti)) = (occ_index(o), task_index(t)) {
                occ_tasks[occ_fill[oi]] = ti as u32;
                occ_fill[oi] += 1;
                task_occs[task_fill[ti]] = oi as u32;
                task_fill[ti] += 1;
            }
        }

        Self {
            occupations,
            tasks,
            occ_offsets,
            occ_tasks,
            task_offsets,
            task_occs,
        }
    }

    pub fn occupation_count(&self) -> usize {
        self.occupations.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupations.is_empty()
    }

    /// Occupation codes in index order.
    pub fn occupations(&self) -> &[String] {
        &self.occupations
    }

    /// Number of tasks incident to occupation `o`.
    pub fn occupation_degree(&self, o: usize) -> usize {
        self.occ_offsets[o + 1] - self.occ_offsets[o]
    }

    /// Run `rounds` of the mutual mean-score update and return the final
    /// occupation score vector (pre-normalization).
    ///
    /// Per round, every task score becomes the mean score of its incident
    /// occupations, then every occupation score becomes the mean of its
    /// incident tasks' just-updated scores. Denominators are clamped to 1
    /// so a degree-zero node divides by one and keeps a constant score.
    pub fn propagate(&self, rounds: usize) -> Vec<f64> {
        let mut occ_scores = vec![1.0f64; self.occupations.len()];
        let mut task_scores = vec![1.0f64; self.tasks.len()];

        for _ in 0..rounds {
            for t in 0..self.tasks.len() {
                let (start, end) = (self.task_offsets[t], self.task_offsets[t + 1]);
                let sum: f64 = self.task_occs[start..end]
                    .iter()
                    .map(|&o| occ_scores[o as usize])
                    .sum();
                task_scores[t] = sum / (end - start).max(1) as f64;
            }
            for o in 0..self.occupations.len() {
                let (start, end) = (self.occ_offsets[o], self.occ_offsets[o + 1]);
                let sum: f64 = self.occ_tasks[start..end]
                    .iter()
                    .map(|&t| task_scores[t as usize])
                    .sum();
                occ_scores[o] = sum / (end - start).max(1) as f64;
            }
        }

        occ_scores
    }
}

/// Exclusive prefix sums with a trailing total, so `out[i]..out[i + 1]`
/// spans element `i`'s slice.
fn prefix_sums(degrees: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(degrees.len() + 1);
    let mut total = 0;
    offsets.push(0);
    for &d in degrees {
        total += d;
        offsets.push(total);
    }
    offsets
}
