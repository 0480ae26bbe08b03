use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    CollectionStats, Document, HealthStatus, HybridQuery, MetadataFilter, MmrQuery, Result,
    SearchQuery, SearchResult, VectorError,
};

/// The closed set of vector backends Veclayer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Pgvector,
    Qdrant,
    Pinecone,
    Chroma,
    Milvus,
    Weaviate,
}

impl ProviderKind {
    /// Every supported provider, in declaration order.
    pub const ALL: [ProviderKind; 6] = [
        Self::Pgvector,
        Self::Qdrant,
        Self::Pinecone,
        Self::Chroma,
        Self::Milvus,
        Self::Weaviate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pgvector => "pgvector",
            Self::Qdrant => "qdrant",
            Self::Pinecone => "pinecone",
            Self::Chroma => "chroma",
            Self::Milvus => "milvus",
            Self::Weaviate => "weaviate",
        }
    }

    /// Whether a real (non-stub) implementation exists for this provider.
    pub fn is_implemented(self) -> bool {
        matches!(self, Self::Pgvector)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VectorError::provider_not_supported(s))
    }
}

/// The narrow set of operations a concrete backend implements.
///
/// Implementations contain only backend-specific work. Validation, lifecycle
/// gating, caching, deadlines and logging are layered on top by the
/// `VectorStore` wrapper in the `veclayer` crate, so inputs reaching these
/// methods have already been checked (valid collection names, documents of
/// the configured dimensions, queries with in-range parameters).
#[async_trait]
pub trait VectorProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Acquire backend resources (connection pool, bootstrap DDL).
    async fn initialize(&self) -> Result<()>;

    /// Release backend resources.
    async fn dispose(&self) -> Result<()>;

    async fn health_check(&self) -> Result<HealthStatus>;

    /// Provision a collection. Fails with `CollectionExists` if already present.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Drop a collection. Fails with `CollectionNotFound` if absent.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn collection_stats(&self, name: &str) -> Result<CollectionStats>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Insert or overwrite documents, returning how many were written.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize>;

    /// Delete documents by id, returning how many rows were removed.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<u64>;

    /// Fetch documents by id, in request order, skipping unknown ids.
    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>>;

    async fn count(&self, collection: &str, filter: Option<&MetadataFilter>) -> Result<u64>;

    /// Nearest-neighbour search.
    async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<SearchResult>>;

    /// Keyword + vector search fused by weighted reciprocal rank.
    async fn hybrid_search(
        &self,
        collection: &str,
        query: &HybridQuery,
    ) -> Result<Vec<SearchResult>>;

    /// Diversity-aware search. `query.fetch_k` is always resolved by the caller.
    async fn mmr_search(&self, collection: &str, query: &MmrQuery) -> Result<Vec<SearchResult>>;

    /// Rebuild indexes and refresh planner statistics.
    async fn optimize(&self, collection: &str) -> Result<()>;

    /// Reclaim space held by deleted rows.
    async fn vacuum(&self, collection: &str) -> Result<()>;
}
