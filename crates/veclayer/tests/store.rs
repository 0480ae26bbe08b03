mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, InMemoryProvider};
use serde_json::json;
use veclayer::{
    CacheConfig, Document, ErrorKind, FakeEmbeddings, HybridQuery, MetadataFilter, MmrQuery,
    PgVectorConfig, ProviderConfig, SearchQuery, SearchResult, StoreConfig, VectorStore,
};

fn config(dimensions: usize) -> StoreConfig {
    StoreConfig::new(
        ProviderConfig::Pgvector(PgVectorConfig::new("postgres://localhost/unused")),
        dimensions,
    )
}

async fn ready_store(provider: Arc<InMemoryProvider>, config: StoreConfig) -> VectorStore {
    init_tracing();
    let store = VectorStore::new(provider, config);
    store.initialize().await.unwrap();
    store.create_collection("docs").await.unwrap();
    store
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn hit_ids(hits: &[SearchResult]) -> Vec<String> {
    hits.iter().map(|h| h.id.clone()).collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_is_idempotent() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = VectorStore::new(provider.clone(), config(3));

    assert!(!store.is_initialized());
    store.initialize().await.unwrap();
    store.initialize().await.unwrap();
    assert!(store.is_initialized());
    assert_eq!(provider.count_calls("initialize"), 1);
}

#[tokio::test]
async fn dispose_before_initialize_is_a_no_op() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = VectorStore::new(provider.clone(), config(3));

    store.dispose().await.unwrap();
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn operations_require_initialize() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = VectorStore::new(provider.clone(), config(3));

    let err = store.list_collections().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInitialized);
    let err = store
        .search("docs", &SearchQuery::new(vec![1.0, 0.0, 0.0], 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInitialized);

    store.initialize().await.unwrap();
    store.dispose().await.unwrap();
    let err = store.count("docs", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInitialized);
    assert_eq!(provider.calls(), vec!["initialize", "dispose"]);
}

#[tokio::test]
async fn health_check_never_fails() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = VectorStore::new(provider.clone(), config(3));

    // Reported as unhealthy rather than failing with NotInitialized.
    let status = store.health_check().await;
    assert!(!status.healthy);
    assert_eq!(status.error.as_deref(), Some("vector store is not initialized"));
    assert_eq!(provider.count_calls("health_check"), 0);

    store.initialize().await.unwrap();
    assert!(store.health_check().await.healthy);
}

// ---------------------------------------------------------------------------
// Validation happens before any provider call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_collection_name_is_rejected_without_io() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = VectorStore::new(provider.clone(), config(3));
    store.initialize().await.unwrap();

    let err = store.create_collection("x!bad").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCollectionName);
    assert!(err.kind().is_validation());
    assert_eq!(provider.count_calls("create_collection"), 0);
}

#[tokio::test]
async fn zero_top_k_is_rejected_without_io() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(3)).await;

    let err = store
        .search("docs", &SearchQuery::new(vec![1.0, 0.0, 0.0], 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    assert_eq!(provider.count_calls("search"), 0);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected_without_io() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(3)).await;

    let err = store
        .upsert(
            "docs",
            &[
                Document::new("ok", vec![1.0, 0.0, 0.0]),
                Document::new("short", vec![1.0, 0.0]),
            ],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEmbeddingDimensions);
    assert_eq!(err.context().unwrap()["expected"], 3);
    assert_eq!(err.context().unwrap()["actual"], 2);
    assert_eq!(provider.count_calls("upsert"), 0);

    let err = store
        .mmr_search("docs", &MmrQuery::new(SearchQuery::new(vec![1.0], 1)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEmbeddingDimensions);

    let err = store
        .hybrid_search(
            "docs",
            &HybridQuery::new(SearchQuery::new(vec![1.0, 0.0, 0.0], 1), " "),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    assert_eq!(provider.count_calls("hybrid_search"), 0);
}

#[tokio::test]
async fn empty_inputs_short_circuit() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(3)).await;

    assert_eq!(store.upsert("docs", &[]).await.unwrap(), 0);
    assert_eq!(store.delete("docs", &[]).await.unwrap(), 0);
    assert!(store.get("docs", &[]).await.unwrap().is_empty());
    assert_eq!(provider.count_calls("upsert"), 0);
    assert_eq!(provider.count_calls("delete"), 0);
    assert_eq!(provider.count_calls("get"), 0);
}

// ---------------------------------------------------------------------------
// End-to-end behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn basic_collection_workflow() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider, config(3)).await;

    store
        .upsert(
            "docs",
            &[
                Document::new("a", vec![1.0, 0.0, 0.0]),
                Document::new("b", vec![0.0, 1.0, 0.0]),
            ],
        )
        .await
        .unwrap();

    let hits = store
        .search("docs", &SearchQuery::new(vec![1.0, 0.0, 0.0], 1))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "a");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert_eq!(store.count("docs", None).await.unwrap(), 2);

    let stats = store.get_collection_stats("docs").await.unwrap();
    assert_eq!(stats.document_count, 2);

    store.delete_collection("docs").await.unwrap();
    assert!(!store.collection_exists("docs").await.unwrap());
}

#[tokio::test]
async fn round_trip_preserves_document() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider, config(3)).await;

    let doc = Document::new("d1", vec![0.25, -0.5, 0.75])
        .with_content("hello world")
        .with_meta("source", "src/lib.rs")
        .with_meta("start_line", 10);
    store.upsert("docs", &[doc.clone()]).await.unwrap();

    let fetched = store.get("docs", &ids(&["d1", "missing"])).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].id, doc.id);
    assert_eq!(fetched[0].content, doc.content);
    assert_eq!(fetched[0].metadata, doc.metadata);
    for (a, b) in fetched[0].embedding.iter().zip(&doc.embedding) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[tokio::test]
async fn filtered_count_uses_metadata() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider, config(2)).await;

    store
        .upsert(
            "docs",
            &[
                Document::new("1", vec![1.0, 0.0]).with_meta("language", "rust"),
                Document::new("2", vec![0.0, 1.0]).with_meta("language", "go"),
            ],
        )
        .await
        .unwrap();

    let filter = MetadataFilter::new().equals("language", "rust");
    assert_eq!(store.count("docs", Some(&filter)).await.unwrap(), 1);
    assert_eq!(
        store.count("docs", Some(&MetadataFilter::new())).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn mmr_with_full_relevance_matches_search() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider, config(2).with_cache(CacheConfig::disabled())).await;

    store
        .upsert(
            "docs",
            &[
                Document::new("a", vec![1.0, 0.0]),
                Document::new("a2", vec![0.99, 0.05]),
                Document::new("b", vec![0.7, 0.7]),
                Document::new("c", vec![0.0, 1.0]),
            ],
        )
        .await
        .unwrap();

    let base = SearchQuery::new(vec![1.0, 0.0], 3);
    let plain: Vec<String> = store
        .search("docs", &base)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    let mmr: Vec<String> = store
        .mmr_search("docs", &MmrQuery::new(base.clone()).with_lambda(1.0))
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(plain, mmr);

    let diverse = store
        .mmr_search("docs", &MmrQuery::new(base).with_lambda(0.0))
        .await
        .unwrap();
    assert_eq!(diverse.len(), 3);
    assert_ne!(diverse[1].id, "a2");
}

fn embedded_chunks(embeddings: &FakeEmbeddings) -> Vec<Document> {
    [
        ("pg", "postgres vector index tuning"),
        ("pg2", "postgres index"),
        ("vec", "vector math"),
        ("tokio", "tokio async runtime"),
        ("serde", "serde json derive"),
    ]
    .into_iter()
    .map(|(id, text)| Document::new(id, embeddings.embed(text)).with_content(text))
    .collect()
}

#[tokio::test]
async fn hybrid_fuses_vector_and_keyword_rankings() {
    let embeddings = FakeEmbeddings::new(16);
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider, config(16).with_cache(CacheConfig::disabled())).await;
    store
        .upsert("docs", &embedded_chunks(&embeddings))
        .await
        .unwrap();

    let text = "postgres vector index";
    let base = SearchQuery::new(embeddings.embed(text), 5);
    let vector_order = hit_ids(&store.search("docs", &base).await.unwrap());
    assert_eq!(vector_order.len(), 5);
    let hybrid = |alpha: f32| HybridQuery::new(base.clone(), text).with_alpha(alpha);

    let hits = store.hybrid_search("docs", &hybrid(1.0)).await.unwrap();
    assert_eq!(hit_ids(&hits), vector_order);

    // Keyword order is by shared words; rows sharing none tie and sort by id.
    let hits = store.hybrid_search("docs", &hybrid(0.0)).await.unwrap();
    assert_eq!(hit_ids(&hits), ids(&["pg", "pg2", "vec", "serde", "tokio"]));
    assert!((hits[0].score - 1.0).abs() < 1e-6);

    // "tokio" has no keyword match, so its keyword rank is fetch + 1.
    let (k, fetch) = (60.0_f64, 5.0 * 4.0);
    let rank = vector_order.iter().position(|id| id == "tokio").unwrap() as f64 + 1.0;
    let expected = (0.5 / (k + rank) + 0.5 / (k + fetch + 1.0)) * (k + 1.0);
    let hits = store.hybrid_search("docs", &hybrid(0.5)).await.unwrap();
    let tokio_hit = hits.iter().find(|h| h.id == "tokio").unwrap();
    assert!((f64::from(tokio_hit.score) - expected).abs() < 1e-6);
    assert_eq!(tokio_hit.content.as_deref(), Some("tokio async runtime"));
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_search_is_served_from_cache() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2)).await;
    store
        .upsert("docs", &[Document::new("a", vec![1.0, 0.0])])
        .await
        .unwrap();

    let query = SearchQuery::new(vec![1.0, 0.0], 5);
    let first = store.search("docs", &query).await.unwrap();
    let second = store.search("docs", &query).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(provider.count_calls("search"), 1);

    let stats = store.cache_stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    // A different query is a different entry.
    store
        .search("docs", &query.clone().include_metadata(false))
        .await
        .unwrap();
    assert_eq!(provider.count_calls("search"), 2);
}

#[tokio::test]
async fn writes_invalidate_only_their_collection() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2)).await;
    store.create_collection("other").await.unwrap();

    let query = SearchQuery::new(vec![1.0, 0.0], 5);
    store.search("docs", &query).await.unwrap();
    store.search("other", &query).await.unwrap();
    assert_eq!(provider.count_calls("search"), 2);

    store
        .upsert("docs", &[Document::new("new", vec![1.0, 0.0])])
        .await
        .unwrap();

    let hits = store.search("docs", &query).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "new");
    assert_eq!(provider.count_calls("search"), 3);

    store.search("other", &query).await.unwrap();
    assert_eq!(provider.count_calls("search"), 3);

    store.delete("docs", &ids(&["new"])).await.unwrap();
    assert!(store.search("docs", &query).await.unwrap().is_empty());
    assert_eq!(provider.count_calls("search"), 4);
}

#[tokio::test]
async fn recreated_collection_is_not_served_stale_results() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2)).await;
    store
        .upsert("docs", &[Document::new("old", vec![1.0, 0.0])])
        .await
        .unwrap();
    let query = SearchQuery::new(vec![1.0, 0.0], 5);
    assert_eq!(hit_ids(&store.search("docs", &query).await.unwrap()), ids(&["old"]));

    store.delete_collection("docs").await.unwrap();
    store.create_collection("docs").await.unwrap();
    assert!(store.search("docs", &query).await.unwrap().is_empty());
    assert_eq!(provider.count_calls("search"), 2);
}

#[tokio::test]
async fn hybrid_and_mmr_bypass_cache() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2)).await;

    let hybrid = HybridQuery::new(SearchQuery::new(vec![1.0, 0.0], 2), "rust");
    store.hybrid_search("docs", &hybrid).await.unwrap();
    store.hybrid_search("docs", &hybrid).await.unwrap();
    assert_eq!(provider.count_calls("hybrid_search"), 2);

    let mmr = MmrQuery::new(SearchQuery::new(vec![1.0, 0.0], 2));
    store.mmr_search("docs", &mmr).await.unwrap();
    store.mmr_search("docs", &mmr).await.unwrap();
    assert_eq!(provider.count_calls("mmr_search"), 2);
}

#[tokio::test]
async fn disabled_cache_always_hits_provider() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2).with_cache(CacheConfig::disabled())).await;

    let query = SearchQuery::new(vec![1.0, 0.0], 5);
    store.search("docs", &query).await.unwrap();
    store.search("docs", &query).await.unwrap();
    assert_eq!(provider.count_calls("search"), 2);
    assert!(store.cache_stats().await.is_none());
}

#[tokio::test]
async fn dispose_clears_cache() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2)).await;

    let query = SearchQuery::new(vec![1.0, 0.0], 5);
    store.search("docs", &query).await.unwrap();
    assert_eq!(store.cache_stats().await.unwrap().size, 1);

    store.dispose().await.unwrap();
    assert_eq!(store.cache_stats().await.unwrap().size, 0);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let provider = Arc::new(InMemoryProvider::new());
    let store = ready_store(provider.clone(), config(2)).await;

    let query = SearchQuery::new(vec![1.0, 0.0], 5)
        .with_filter(MetadataFilter::new().equals("tag", json!("x")));
    store.search("docs", &query).await.unwrap();
    store.clear_cache().await;
    store.search("docs", &query).await.unwrap();
    assert_eq!(provider.count_calls("search"), 2);
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_provider_call_times_out() {
    let provider = Arc::new(InMemoryProvider::with_search_delay(Duration::from_secs(5)));
    let store = ready_store(
        provider,
        config(2).with_operation_timeout(Duration::from_millis(100)),
    )
    .await;

    let err = store
        .search("docs", &SearchQuery::new(vec![1.0, 0.0], 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_retryable());
    assert_eq!(err.context().unwrap()["operation"], "search");
}
