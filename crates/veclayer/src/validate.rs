//! Structural checks run before any provider call.

use serde_json::json;
use veclayer_core::{
    Document, HybridQuery, MmrQuery, ProviderKind, Result, SearchQuery, VectorError,
};

/// Collection names are non-empty `[A-Za-z0-9_-]+`.
pub(crate) fn collection_name(provider: ProviderKind, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(VectorError::invalid_collection_name(provider, name))
    }
}

fn unit_interval(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Length must equal `dimensions`; returns the index of the first non-finite value.
fn embedding(provider: ProviderKind, dimensions: usize, values: &[f32]) -> Result<Option<usize>> {
    if values.len() != dimensions {
        return Err(VectorError::dimension_mismatch(provider, dimensions, values.len()));
    }
    Ok(values.iter().position(|v| !v.is_finite()))
}

pub(crate) fn document(provider: ProviderKind, dimensions: usize, doc: &Document) -> Result<()> {
    if doc.id.is_empty() {
        return Err(VectorError::invalid_document(provider, "document id must not be empty"));
    }
    if let Some(index) = embedding(provider, dimensions, &doc.embedding)? {
        return Err(VectorError::invalid_document(
            provider,
            format!("document '{}' has a non-finite embedding value", doc.id),
        )
        .with_context(json!({ "id": doc.id, "index": index })));
    }
    Ok(())
}

pub(crate) fn search_query(provider: ProviderKind, dimensions: usize, query: &SearchQuery) -> Result<()> {
    if query.top_k == 0 {
        return Err(VectorError::invalid_query(provider, "top_k must be greater than 0"));
    }
    if let Some(threshold) = query.score_threshold {
        if !unit_interval(threshold) {
            return Err(VectorError::invalid_query(
                provider,
                format!("score_threshold must be in [0, 1], got {threshold}"),
            ));
        }
    }
    if let Some(index) = embedding(provider, dimensions, &query.embedding)? {
        return Err(VectorError::invalid_query(
            provider,
            "query embedding contains a non-finite value",
        )
        .with_context(json!({ "index": index })));
    }
    Ok(())
}

pub(crate) fn hybrid_query(provider: ProviderKind, dimensions: usize, query: &HybridQuery) -> Result<()> {
    search_query(provider, dimensions, &query.query)?;
    if query.text.trim().is_empty() {
        return Err(VectorError::invalid_query(provider, "hybrid search text must not be empty"));
    }
    if !unit_interval(query.alpha) {
        return Err(VectorError::invalid_query(
            provider,
            format!("alpha must be in [0, 1], got {}", query.alpha),
        ));
    }
    Ok(())
}

pub(crate) fn mmr_query(provider: ProviderKind, dimensions: usize, query: &MmrQuery) -> Result<()> {
    search_query(provider, dimensions, &query.query)?;
    if !unit_interval(query.lambda) {
        return Err(VectorError::invalid_query(
            provider,
            format!("lambda must be in [0, 1], got {}", query.lambda),
        ));
    }
    if query.fetch_k == Some(0) {
        return Err(VectorError::invalid_query(provider, "fetch_k must be greater than 0"));
    }
    Ok(())
}
