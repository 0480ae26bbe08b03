//! In-memory `VectorProvider` that records every call it receives.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use veclayer::{
    CollectionStats, DistanceMetric, Document, HealthStatus, HybridQuery, MetadataFilter, MmrQuery,
    ProviderKind, Result, SearchQuery, SearchResult, SearchTuning, VectorError, VectorProvider,
};
use veclayer_core::{
    cosine_similarity, distance_to_similarity, maximal_marginal_relevance, reciprocal_rank_fusion,
    MmrCandidate,
};

const KIND: ProviderKind = ProviderKind::Pgvector;

#[derive(Default)]
pub struct InMemoryProvider {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    calls: Mutex<Vec<String>>,
    pub initialize_calls: AtomicUsize,
    /// Artificial latency added to every search.
    pub search_delay: Option<Duration>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_delay(delay: Duration) -> Self {
        Self {
            search_delay: Some(delay),
            ..Self::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    /// Every hook invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times `operation` was invoked.
    pub fn count_calls(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    fn missing(collection: &str) -> VectorError {
        VectorError::collection_not_found(KIND, collection)
    }

    async fn ranked(&self, collection: &str, query: &SearchQuery, limit: usize) -> Result<Vec<SearchResult>> {
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        let collections = self.collections.read().await;
        let docs = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        let mut hits: Vec<SearchResult> = docs
            .values()
            .filter(|doc| query.filter.as_ref().map_or(true, |f| f.matches(&doc.metadata)))
            .map(|doc| {
                let distance = 1.0 - cosine_similarity(&query.embedding, &doc.embedding) as f64;
                hit(doc, distance_to_similarity(DistanceMetric::Cosine, distance), query)
            })
            .filter(|hit| query.accepts(hit.score))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Ids of documents sharing at least one word with `text`, most shared
    /// words first.
    async fn keyword_ranked(
        &self,
        collection: &str,
        text: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let terms = words(text);
        let collections = self.collections.read().await;
        let docs = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        let mut ranked: Vec<(usize, &str)> = docs
            .values()
            .filter(|doc| filter.map_or(true, |f| f.matches(&doc.metadata)))
            .map(|doc| {
                let content = words(&doc.content);
                let shared = terms.iter().filter(|t| content.contains(*t)).count();
                (shared, doc.id.as_str())
            })
            .filter(|(shared, _)| *shared > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.to_string())
            .collect())
    }
}

fn words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    words.sort();
    words.dedup();
    words
}

fn hit(doc: &Document, score: f32, query: &SearchQuery) -> SearchResult {
    let mut hit = SearchResult::new(doc.id.clone(), score);
    hit.content = query.include_content.then(|| doc.content.clone());
    hit.metadata = query.include_metadata.then(|| doc.metadata.clone());
    hit.embedding = query.include_embedding.then(|| doc.embedding.clone());
    hit
}

#[async_trait]
impl VectorProvider for InMemoryProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn initialize(&self) -> Result<()> {
        self.record("initialize");
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        self.record("dispose");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        self.record("health_check");
        Ok(HealthStatus::healthy(KIND, 0))
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        self.record("create_collection");
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(VectorError::collection_exists(KIND, name));
        }
        collections.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.record("delete_collection");
        self.collections
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::missing(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.record("list_collections");
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn collection_stats(&self, name: &str) -> Result<CollectionStats> {
        self.record("collection_stats");
        let collections = self.collections.read().await;
        let docs = collections.get(name).ok_or_else(|| Self::missing(name))?;
        Ok(CollectionStats {
            name: name.to_string(),
            document_count: docs.len() as u64,
            dimensions: docs.values().next().map_or(0, |d| d.embedding.len()),
            index_size_bytes: None,
            created_at: None,
            updated_at: None,
        })
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.record("collection_exists");
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        self.record("upsert");
        let mut collections = self.collections.write().await;
        let docs = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        let mut written = std::collections::HashSet::new();
        for doc in documents {
            docs.insert(doc.id.clone(), doc.clone());
            written.insert(doc.id.as_str());
        }
        Ok(written.len())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<u64> {
        self.record("delete");
        let mut collections = self.collections.write().await;
        let docs = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(ids.iter().filter(|id| docs.remove(*id).is_some()).count() as u64)
    }

    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>> {
        self.record("get");
        let collections = self.collections.read().await;
        let docs = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        let mut seen = std::collections::HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| docs.get(id).cloned())
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<&MetadataFilter>) -> Result<u64> {
        self.record("count");
        let collections = self.collections.read().await;
        let docs = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(docs
            .values()
            .filter(|d| filter.map_or(true, |f| f.matches(&d.metadata)))
            .count() as u64)
    }

    async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.record("search");
        self.ranked(collection, query, query.top_k).await
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        query: &HybridQuery,
    ) -> Result<Vec<SearchResult>> {
        self.record("hybrid_search");
        let base = &query.query;
        let tuning = SearchTuning::default();
        let fetch = base.top_k.saturating_mul(tuning.hybrid_fetch_multiplier);

        let mut unthresholded = base.clone();
        unthresholded.score_threshold = None;
        let vector_ids: Vec<String> = self
            .ranked(collection, &unthresholded, fetch)
            .await?
            .into_iter()
            .map(|h| h.id)
            .collect();
        let text_ids = self
            .keyword_ranked(collection, &query.text, base.filter.as_ref(), fetch)
            .await?;

        let fused = reciprocal_rank_fusion(
            &vector_ids,
            &text_ids,
            query.alpha,
            tuning.rrf_k,
            fetch,
            base.top_k,
        );
        let collections = self.collections.read().await;
        let docs = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(fused
            .into_iter()
            .filter(|(_, score)| base.accepts(*score))
            .filter_map(|(id, score)| docs.get(&id).map(|doc| hit(doc, score, base)))
            .collect())
    }

    async fn mmr_search(&self, collection: &str, query: &MmrQuery) -> Result<Vec<SearchResult>> {
        self.record("mmr_search");
        let fetch_k = query.fetch_k.unwrap_or(query.query.top_k);
        let base = query.query.clone().include_embedding(true);
        let candidates = self.ranked(collection, &base, fetch_k).await?;
        let pool: Vec<MmrCandidate<'_>> = candidates
            .iter()
            .map(|c| MmrCandidate {
                relevance: c.score,
                embedding: c.embedding.as_deref().unwrap_or(&[]),
            })
            .collect();
        let picked = maximal_marginal_relevance(&pool, query.query.top_k, query.lambda, None);
        Ok(picked.into_iter().map(|i| candidates[i].clone()).collect())
    }

    async fn optimize(&self, _collection: &str) -> Result<()> {
        self.record("optimize");
        Ok(())
    }

    async fn vacuum(&self, _collection: &str) -> Result<()> {
        self.record("vacuum");
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
