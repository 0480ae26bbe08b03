use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use veclayer_cache::{fingerprint, CacheStats, QueryCache};
use veclayer_core::{
    CollectionStats, Document, HealthStatus, HybridQuery, MetadataFilter, MmrQuery, ProviderKind,
    Result, SearchQuery, SearchResult, StoreConfig, VectorError, VectorProvider,
};

use crate::validate;

/// A vector store: any [`VectorProvider`] wrapped with lifecycle gating,
/// input validation, per-operation deadlines, structured logging and a
/// read-through cache for plain [`search`](Self::search).
///
/// Every input is validated before the provider sees it, so a rejected call
/// never performs I/O. Writes to a collection (`upsert`, `delete`,
/// `create_collection`, `delete_collection`) drop that collection's cached
/// results; other collections keep theirs.
///
/// ```rust,no_run
/// use veclayer::{
///     Document, PgVectorConfig, ProviderConfig, SearchQuery, StoreConfig, StoreFactory,
/// };
///
/// # async fn example() -> veclayer::Result<()> {
/// let config = StoreConfig::new(
///     ProviderConfig::Pgvector(PgVectorConfig::from_env("DATABASE_URL")),
///     3,
/// );
/// let store = StoreFactory::create(config)?;
/// store.initialize().await?;
/// store.create_collection("docs").await?;
/// store
///     .upsert("docs", &[Document::new("a", vec![1.0, 0.0, 0.0]).with_content("hello")])
///     .await?;
/// let hits = store.search("docs", &SearchQuery::new(vec![1.0, 0.0, 0.0], 5)).await?;
/// # Ok(())
/// # }
/// ```
pub struct VectorStore {
    provider: Arc<dyn VectorProvider>,
    config: StoreConfig,
    cache: Option<QueryCache<Vec<SearchResult>>>,
    /// Serializes `initialize` / `dispose`.
    lifecycle: Mutex<()>,
    initialized: AtomicBool,
}

impl VectorStore {
    /// Wrap a provider. The store starts uninitialized.
    pub fn new(provider: Arc<dyn VectorProvider>, config: StoreConfig) -> Self {
        let cache = QueryCache::from_config(&config.cache);
        Self {
            provider,
            config,
            cache,
            lifecycle: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(VectorError::not_initialized(self.provider_kind()))
        }
    }

    /// Run one provider call under the configured deadline, logging start,
    /// duration and outcome.
    async fn call<T, F>(&self, operation: &'static str, collection: Option<&str>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let provider = self.provider_kind().as_str();
        tracing::debug!(operation, collection, provider, "vector store operation started");
        let start = Instant::now();

        let outcome = match self.config.operation_timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(VectorError::timeout(
                    self.provider_kind(),
                    operation,
                    deadline.as_millis() as u64,
                )),
            },
            None => fut.await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::debug!(
                operation,
                collection,
                provider,
                duration_ms,
                status = "ok",
                "vector store operation finished"
            ),
            Err(e) => tracing::warn!(
                operation,
                collection,
                provider,
                duration_ms,
                status = "error",
                code = e.code(),
                error = %e,
                "vector store operation failed"
            ),
        }
        outcome
    }

    async fn invalidate(&self, collection: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_collection(collection).await;
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Acquire provider resources. A second call is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_initialized() {
            tracing::debug!(provider = self.provider_kind().as_str(), "vector store already initialized");
            return Ok(());
        }
        self.call("initialize", None, self.provider.initialize()).await?;
        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            provider = self.provider_kind().as_str(),
            dimensions = self.config.dimensions,
            metric = self.config.distance_metric.as_str(),
            cache = self.cache.is_some(),
            "vector store initialized"
        );
        Ok(())
    }

    /// Release provider resources and clear the cache. A no-op when not
    /// initialized. The store is uninitialized afterwards even if the
    /// provider reports an error while tearing down.
    pub async fn dispose(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if !self.is_initialized() {
            return Ok(());
        }
        self.initialized.store(false, Ordering::Release);
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
        self.call("dispose", None, self.provider.dispose()).await?;
        tracing::info!(provider = self.provider_kind().as_str(), "vector store disposed");
        Ok(())
    }

    /// Probe the backend. Never fails: problems are reported through
    /// `healthy = false` and `error`.
    pub async fn health_check(&self) -> HealthStatus {
        let kind = self.provider_kind();
        if !self.is_initialized() {
            return HealthStatus::unhealthy(kind, 0, "vector store is not initialized");
        }
        let start = Instant::now();
        match self.call("health_check", None, self.provider.health_check()).await {
            Ok(status) => status,
            Err(e) => HealthStatus::unhealthy(kind, start.elapsed().as_millis() as u64, e.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    pub async fn create_collection(&self, name: &str) -> Result<()> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), name)?;
        let result = self
            .call("create_collection", Some(name), self.provider.create_collection(name))
            .await;
        self.invalidate(name).await;
        result
    }

    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), name)?;
        let result = self
            .call("delete_collection", Some(name), self.provider.delete_collection(name))
            .await;
        if let Some(cache) = &self.cache {
            cache.forget_collection(name).await;
        }
        result
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.ensure_initialized()?;
        self.call("list_collections", None, self.provider.list_collections())
            .await
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), name)?;
        self.call("collection_exists", Some(name), self.provider.collection_exists(name))
            .await
    }

    pub async fn get_collection_stats(&self, name: &str) -> Result<CollectionStats> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), name)?;
        self.call("get_collection_stats", Some(name), self.provider.collection_stats(name))
            .await
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Insert or overwrite documents. Ids repeated within one call keep
    /// their last occurrence. Returns the number of distinct documents written.
    pub async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        self.ensure_initialized()?;
        let kind = self.provider_kind();
        validate::collection_name(kind, collection)?;
        for doc in documents {
            validate::document(kind, self.config.dimensions, doc)?;
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let result = self
            .call("upsert", Some(collection), self.provider.upsert(collection, documents))
            .await;
        self.invalidate(collection).await;
        result
    }

    pub async fn delete(&self, collection: &str, ids: &[String]) -> Result<u64> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), collection)?;
        if ids.is_empty() {
            return Ok(0);
        }

        let result = self
            .call("delete", Some(collection), self.provider.delete(collection, ids))
            .await;
        self.invalidate(collection).await;
        result
    }

    /// Documents in request order; unknown ids are skipped.
    pub async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), collection)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call("get", Some(collection), self.provider.get(collection, ids))
            .await
    }

    pub async fn count(&self, collection: &str, filter: Option<&MetadataFilter>) -> Result<u64> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), collection)?;
        self.call("count", Some(collection), self.provider.count(collection, filter))
            .await
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Nearest-neighbour search, served from the cache when possible.
    pub async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        let kind = self.provider_kind();
        validate::collection_name(kind, collection)?;
        validate::search_query(kind, self.config.dimensions, query)?;

        let Some(cache) = &self.cache else {
            return self
                .call("search", Some(collection), self.provider.search(collection, query))
                .await;
        };

        let key = fingerprint("search", query);
        if let Some(key) = &key {
            if let Some(hits) = cache.get(collection, key).await {
                tracing::debug!(collection, provider = kind.as_str(), "search served from cache");
                return Ok(hits);
            }
        }

        let generation = cache.generation(collection).await;
        let hits = self
            .call("search", Some(collection), self.provider.search(collection, query))
            .await?;
        if let Some(key) = key {
            cache
                .put_if_current(collection, &key, generation, hits.clone())
                .await;
        }
        Ok(hits)
    }

    pub async fn hybrid_search(
        &self,
        collection: &str,
        query: &HybridQuery,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        let kind = self.provider_kind();
        validate::collection_name(kind, collection)?;
        validate::hybrid_query(kind, self.config.dimensions, query)?;
        self.call(
            "hybrid_search",
            Some(collection),
            self.provider.hybrid_search(collection, query),
        )
        .await
    }

    /// Diversity-aware search. Without an explicit `fetch_k` the candidate
    /// pool is `top_k * tuning.mmr_fetch_multiplier`; it is never smaller
    /// than `top_k`.
    pub async fn mmr_search(&self, collection: &str, query: &MmrQuery) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        let kind = self.provider_kind();
        validate::collection_name(kind, collection)?;
        validate::mmr_query(kind, self.config.dimensions, query)?;

        let mut resolved = query.clone();
        resolved.fetch_k = Some(query.effective_fetch_k(self.config.tuning.mmr_fetch_multiplier));
        self.call(
            "mmr_search",
            Some(collection),
            self.provider.mmr_search(collection, &resolved),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Maintenance and cache
    // -----------------------------------------------------------------------

    pub async fn optimize(&self, collection: &str) -> Result<()> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), collection)?;
        self.call("optimize", Some(collection), self.provider.optimize(collection))
            .await
    }

    pub async fn vacuum(&self, collection: &str) -> Result<()> {
        self.ensure_initialized()?;
        validate::collection_name(self.provider_kind(), collection)?;
        self.call("vacuum", Some(collection), self.provider.vacuum(collection))
            .await
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    /// `None` when caching is disabled.
    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }
}
