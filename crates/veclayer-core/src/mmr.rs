//! Maximal marginal relevance re-ranking.

use crate::distance::cosine_similarity;

/// A candidate fetched by nearest-neighbour search.
#[derive(Debug, Clone, PartialEq)]
pub struct MmrCandidate<'a> {
    /// Normalized similarity to the query, in `[0, 1]`.
    pub relevance: f32,
    pub embedding: &'a [f32],
}

/// Greedily select up to `k` candidates balancing relevance and diversity.
///
/// At each step the remaining candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_sim_to_selected` is picked, where
/// the similarity term is cosine similarity and is `0` while nothing has been
/// selected yet. Ties keep the earlier candidate. Candidates whose relevance
/// is below `threshold` are never selected.
///
/// Returns indices into `candidates`, in selection order.
pub fn maximal_marginal_relevance(
    candidates: &[MmrCandidate<'_>],
    k: usize,
    lambda: f32,
    threshold: Option<f32>,
) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..candidates.len())
        .filter(|&i| threshold.map_or(true, |t| candidates[i].relevance >= t))
        .collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(remaining.len()));
    // Running max similarity of each candidate to the selected set.
    let mut redundancy = vec![0.0_f32; candidates.len()];

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &i) in remaining.iter().enumerate() {
            let score = lambda * candidates[i].relevance - (1.0 - lambda) * redundancy[i];
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        let chosen = remaining.remove(best_pos);
        selected.push(chosen);

        for &i in &remaining {
            let sim = cosine_similarity(candidates[i].embedding, candidates[chosen].embedding);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }
    }

    selected
}
