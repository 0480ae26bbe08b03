//! Weighted reciprocal-rank fusion.
//!
//! Two rankings of the same rows (one by vector distance, one by keyword
//! relevance) are combined as
//!
//! ```text
//! rrf(id) = alpha / (k + vector_rank(id)) + (1 - alpha) / (k + text_rank(id))
//! ```
//!
//! with 1-based ranks. Each list is truncated to `fetch` rows before fusion,
//! and a row missing from a list counts as rank `fetch + 1` there. Scores are
//! reported as `rrf * (k + 1)`, so a row ranked first in both lists scores 1.

use std::collections::HashMap;

/// Fused score of one row, already scaled by `k + 1`.
pub fn fused_score(
    alpha: f32,
    k: f64,
    vector_rank: Option<usize>,
    text_rank: Option<usize>,
    fetch: usize,
) -> f64 {
    let alpha = f64::from(alpha);
    let absent = fetch as f64 + 1.0;
    let rank = |r: Option<usize>| r.map_or(absent, |r| r as f64);
    (alpha / (k + rank(vector_rank)) + (1.0 - alpha) / (k + rank(text_rank))) * (k + 1.0)
}

/// Clamp a fused score into `[0, 1]`; non-finite values become 0.
pub fn unit_score(fused: f64) -> f32 {
    if fused.is_finite() {
        fused.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Fuse two ranked id lists into at most `limit` `(id, score)` pairs.
///
/// Lists longer than `fetch` are truncated first. Output is ordered by score
/// descending, ties broken by id.
pub fn reciprocal_rank_fusion(
    vector_ranked: &[String],
    text_ranked: &[String],
    alpha: f32,
    k: f64,
    fetch: usize,
    limit: usize,
) -> Vec<(String, f32)> {
    let mut ranks: HashMap<&str, (Option<usize>, Option<usize>)> = HashMap::new();
    for (i, id) in vector_ranked.iter().take(fetch).enumerate() {
        ranks.entry(id.as_str()).or_default().0.get_or_insert(i + 1);
    }
    for (i, id) in text_ranked.iter().take(fetch).enumerate() {
        ranks.entry(id.as_str()).or_default().1.get_or_insert(i + 1);
    }

    let mut fused: Vec<(&str, f64)> = ranks
        .into_iter()
        .map(|(id, (v, t))| (id, fused_score(alpha, k, v, t, fetch)))
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    fused.truncate(limit);
    fused
        .into_iter()
        .map(|(id, score)| (id.to_string(), unit_score(score)))
        .collect()
}
