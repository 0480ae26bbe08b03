//! Core contracts for Veclayer.
//!
//! Everything here is backend-independent: the [`VectorProvider`] trait every
//! backend implements, the [`VectorError`] taxonomy, configuration types,
//! documents, queries and results, the [`MetadataFilter`] AST with its JSON
//! and SQL translations, distance conversions, rank fusion and the MMR re-ranker.

pub mod config;
pub mod distance;
mod document;
mod embeddings;
mod error;
pub mod filter;
pub mod fusion;
pub mod mmr;
mod provider;
mod query;

pub use config::{
    CacheConfig, ChromaConfig, DistanceMetric, IndexConfig, MilvusConfig, PgVectorConfig,
    PineconeConfig, ProviderConfig, QdrantConfig, SearchTuning, StoreConfig, WeaviateConfig,
    DEFAULT_DIMENSIONS,
};
pub use distance::{cosine_similarity, distance_to_similarity};
pub use document::{metadata_keys, Document, Metadata};
pub use embeddings::{Embeddings, FakeEmbeddings};
pub use error::{BoxError, ErrorKind, Result, VectorError};
pub use filter::{MetadataFilter, SqlFilter, SqlParam};
pub use fusion::{fused_score, reciprocal_rank_fusion};
pub use mmr::{maximal_marginal_relevance, MmrCandidate};
pub use provider::{ProviderKind, VectorProvider};
pub use query::{
    CollectionStats, HealthStatus, HybridQuery, MmrQuery, SearchQuery, SearchResult,
    DEFAULT_ALPHA, DEFAULT_LAMBDA,
};
