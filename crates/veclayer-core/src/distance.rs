//! Distance/similarity conversions shared by providers and the MMR re-ranker.

use crate::DistanceMetric;

/// Convert a raw engine distance into a similarity in `[0, 1]`, higher is
/// more similar.
///
/// - cosine distance `d` in `[0, 2]` maps to `1 - d / 2`
/// - euclidean distance `d >= 0` maps to `1 / (1 + d)`
/// - negative inner product `d` (pgvector's `<#>`) maps to `-d`
///
/// The result is clamped, and non-finite input yields `0.0`.
pub fn distance_to_similarity(metric: DistanceMetric, distance: f64) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    let similarity = match metric {
        DistanceMetric::Cosine => 1.0 - distance / 2.0,
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
        DistanceMetric::DotProduct => -distance,
    };
    similarity.clamp(0.0, 1.0) as f32
}

/// Cosine similarity of two vectors in `[-1, 1]`.
///
/// Returns `0.0` for vectors of different length, empty vectors, or when
/// either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}
