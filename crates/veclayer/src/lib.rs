//! Veclayer: provider-agnostic vector similarity search.
//!
//! Callers store embedded documents under named collections and query them by
//! nearest neighbour, hybrid keyword + vector relevance, or maximal marginal
//! relevance. [`StoreFactory`] turns a [`StoreConfig`] into a [`VectorStore`],
//! which adds lifecycle gating, validation, deadlines, logging and a query
//! cache on top of any [`VectorProvider`].
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `config` (default) | [`StoreFactory::from_source`] and the [`config`] module |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use veclayer::{Document, MetadataFilter, SearchQuery, StoreFactory};
//! use veclayer::config::FileConfigSource;
//!
//! let store = StoreFactory::from_source(&FileConfigSource::new("veclayer.toml"))?;
//! store.initialize().await?;
//! let query = SearchQuery::new(embedding, 10)
//!     .with_filter(MetadataFilter::new().equals("language", "rust"));
//! let hits = store.search("docs", &query).await?;
//! ```

mod factory;
mod store;
mod unimplemented;
mod validate;

pub use factory::{StoreFactory, MAX_DIMENSIONS, MAX_INDEXED_DIMENSIONS, MAX_TABLE_PREFIX_LEN};
pub use store::VectorStore;
pub use unimplemented::UnimplementedProvider;

pub use veclayer_cache::CacheStats;
pub use veclayer_core::{
    metadata_keys, CacheConfig, ChromaConfig, CollectionStats, DistanceMetric, Document,
    Embeddings, ErrorKind, FakeEmbeddings, HealthStatus, HybridQuery, IndexConfig, Metadata,
    MetadataFilter, MilvusConfig, MmrQuery, PgVectorConfig, PineconeConfig, ProviderConfig,
    ProviderKind, QdrantConfig, Result, SearchQuery, SearchResult, SearchTuning, StoreConfig,
    VectorError, VectorProvider, WeaviateConfig, DEFAULT_ALPHA, DEFAULT_DIMENSIONS,
    DEFAULT_LAMBDA,
};
pub use veclayer_pgvector::PgVectorProvider;

/// Configuration loading: file sources, discovery and format detection.
#[cfg(feature = "config")]
pub use veclayer_config as config;
