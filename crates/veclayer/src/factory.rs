use std::sync::Arc;

use serde_json::json;
use veclayer_core::{
    PgVectorConfig, ProviderConfig, ProviderKind, Result, StoreConfig, VectorError,
    VectorProvider,
};
use veclayer_pgvector::PgVectorProvider;

use crate::{UnimplementedProvider, VectorStore};

/// Largest vector the engine stores.
pub const MAX_DIMENSIONS: usize = 16_000;
/// Largest vector pgvector can build an HNSW / IVFFlat index over.
pub const MAX_INDEXED_DIMENSIONS: usize = 2_000;
/// Longest accepted table prefix; leaves room for collection names.
pub const MAX_TABLE_PREFIX_LEN: usize = 16;

/// Builds a [`VectorStore`] for the backend selected by configuration.
pub struct StoreFactory;

impl StoreFactory {
    /// Validate `config` and build an uninitialized store.
    ///
    /// Declared backends without an implementation produce a store whose
    /// every operation, starting with `initialize`, fails with
    /// `ProviderNotImplemented`.
    pub fn create(config: StoreConfig) -> Result<VectorStore> {
        Self::validate(&config)?;

        let provider: Arc<dyn VectorProvider> = match &config.provider {
            ProviderConfig::Pgvector(pg) => Arc::new(PgVectorProvider::new(
                pg.clone(),
                config.dimensions,
                config.distance_metric,
                config.tuning.clone(),
            )),
            other => Arc::new(UnimplementedProvider::new(other.kind())),
        };

        tracing::debug!(
            provider = config.provider_kind().as_str(),
            dimensions = config.dimensions,
            metric = config.distance_metric.as_str(),
            "vector store created"
        );
        Ok(VectorStore::new(provider, config))
    }

    /// Load configuration from `source`, then [`create`](Self::create).
    #[cfg(feature = "config")]
    pub fn from_source(source: &dyn veclayer_config::ConfigSource) -> Result<VectorStore> {
        Self::create(veclayer_config::ConfigSource::load(source)?)
    }

    /// Every provider the configuration accepts.
    pub fn supported_providers() -> Vec<ProviderKind> {
        ProviderKind::ALL.to_vec()
    }

    /// Providers with a real implementation.
    pub fn implemented_providers() -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|p| p.is_implemented())
            .collect()
    }

    /// Check `config` without building anything.
    pub fn validate(config: &StoreConfig) -> Result<()> {
        let kind = config.provider_kind();
        let invalid = |message: String| VectorError::invalid_config(Some(kind), message);

        if config.dimensions == 0 || config.dimensions > MAX_DIMENSIONS {
            return Err(invalid(format!(
                "dimensions must be between 1 and {MAX_DIMENSIONS}, got {}",
                config.dimensions
            ))
            .with_context(json!({ "dimensions": config.dimensions })));
        }

        let cache = &config.cache;
        if cache.enabled && cache.max_entries == 0 {
            return Err(invalid("cache.max_entries must be at least 1 when caching is enabled".into()));
        }

        let tuning = &config.tuning;
        if !(tuning.rrf_k.is_finite() && tuning.rrf_k > 0.0) {
            return Err(invalid(format!("tuning.rrf_k must be positive, got {}", tuning.rrf_k)));
        }
        if tuning.mmr_fetch_multiplier == 0 || tuning.hybrid_fetch_multiplier == 0 {
            return Err(invalid("tuning fetch multipliers must be at least 1".into()));
        }

        if let ProviderConfig::Pgvector(pg) = &config.provider {
            Self::validate_pgvector(pg, config.dimensions)?;
        }
        Ok(())
    }

    fn validate_pgvector(pg: &PgVectorConfig, dimensions: usize) -> Result<()> {
        let invalid = |message: String| VectorError::invalid_config(Some(ProviderKind::Pgvector), message);

        if dimensions > MAX_INDEXED_DIMENSIONS {
            return Err(invalid(format!(
                "pgvector indexes support at most {MAX_INDEXED_DIMENSIONS} dimensions, got {dimensions}"
            ))
            .with_context(json!({ "dimensions": dimensions, "max": MAX_INDEXED_DIMENSIONS })));
        }

        pg.resolve_connection_string()?;

        if pg.max_connections == 0 {
            return Err(invalid("max_connections must be at least 1".into()));
        }
        if pg.min_connections > pg.max_connections {
            return Err(invalid(format!(
                "min_connections ({}) exceeds max_connections ({})",
                pg.min_connections, pg.max_connections
            )));
        }

        if !is_word(&pg.schema) {
            return Err(invalid(format!("invalid schema name '{}'", pg.schema)));
        }
        if !(pg.table_prefix.is_empty() || is_word(&pg.table_prefix))
            || pg.table_prefix.len() > MAX_TABLE_PREFIX_LEN
        {
            return Err(invalid(format!(
                "table_prefix must be at most {MAX_TABLE_PREFIX_LEN} characters of [A-Za-z0-9_], got '{}'",
                pg.table_prefix
            )));
        }
        if !is_word(&pg.text_search_config) {
            return Err(invalid(format!(
                "invalid text_search_config '{}'",
                pg.text_search_config
            )));
        }
        Ok(())
    }
}

/// Non-empty `[A-Za-z0-9_]+`.
fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
