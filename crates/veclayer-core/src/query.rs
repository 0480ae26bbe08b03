use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Metadata, MetadataFilter, ProviderKind};

/// Default weight of the vector ranking in hybrid search.
pub const DEFAULT_ALPHA: f32 = 0.5;
/// Default relevance/diversity trade-off in MMR search.
pub const DEFAULT_LAMBDA: f32 = 0.5;

/// Plain nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub embedding: Vec<f32>,
    pub top_k: usize,
    /// Minimum normalized score in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    #[serde(default = "default_true")]
    pub include_content: bool,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default)]
    pub include_embedding: bool,
}

fn default_true() -> bool {
    true
}

impl SearchQuery {
    pub fn new(embedding: Vec<f32>, top_k: usize) -> Self {
        Self {
            embedding,
            top_k,
            score_threshold: None,
            filter: None,
            include_content: true,
            include_metadata: true,
            include_embedding: false,
        }
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn include_content(mut self, include: bool) -> Self {
        self.include_content = include;
        self
    }

    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn include_embedding(mut self, include: bool) -> Self {
        self.include_embedding = include;
        self
    }

    /// The filter, if present and non-empty.
    pub fn active_filter(&self) -> Option<&MetadataFilter> {
        self.filter.as_ref().filter(|f| !f.is_empty())
    }

    /// Whether a normalized score passes the threshold.
    pub fn accepts(&self, score: f32) -> bool {
        self.score_threshold.map_or(true, |t| score >= t)
    }
}

/// Keyword + vector query fused by reciprocal rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridQuery {
    #[serde(flatten)]
    pub query: SearchQuery,
    pub text: String,
    /// 0 = keyword only, 1 = vector only.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
}

fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}

impl HybridQuery {
    pub fn new(query: SearchQuery, text: impl Into<String>) -> Self {
        Self {
            query,
            text: text.into(),
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }
}

/// Maximal-marginal-relevance query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmrQuery {
    #[serde(flatten)]
    pub query: SearchQuery,
    /// 0 = maximum diversity, 1 = maximum relevance.
    #[serde(default = "default_lambda")]
    pub lambda: f32,
    /// Candidate pool size; defaults to `top_k` times the configured multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_k: Option<usize>,
}

fn default_lambda() -> f32 {
    DEFAULT_LAMBDA
}

impl MmrQuery {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            lambda: DEFAULT_LAMBDA,
            fetch_k: None,
        }
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = Some(fetch_k);
        self
    }

    /// Candidate pool size, never smaller than `top_k`.
    pub fn effective_fetch_k(&self, multiplier: usize) -> usize {
        self.fetch_k
            .unwrap_or_else(|| self.query.top_k.saturating_mul(multiplier))
            .max(self.query.top_k)
    }
}

/// One ranked hit. `score` is always in `[0, 1]`, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            content: None,
            metadata: None,
            embedding: None,
        }
    }
}

/// Summary of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub document_count: u64,
    pub dimensions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub provider: ProviderKind,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn healthy(provider: ProviderKind, latency_ms: u64) -> Self {
        Self {
            healthy: true,
            provider,
            latency_ms,
            details: None,
            error: None,
        }
    }

    pub fn unhealthy(provider: ProviderKind, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            provider,
            latency_ms,
            details: None,
            error: Some(error.into()),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
