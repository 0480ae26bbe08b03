use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Executor, FromRow};
use veclayer_core::{
    distance_to_similarity, fusion, maximal_marginal_relevance, HybridQuery, Metadata,
    MmrCandidate, MmrQuery, Result, SearchQuery, SearchResult,
};

use crate::error::map_sqlx;
use crate::sql::{self, bind_filter, clamp_limit};
use crate::PgVectorProvider;

#[derive(sqlx::FromRow)]
struct HitRow {
    id: String,
    content: String,
    metadata: Json<Metadata>,
    embedding: Option<Vector>,
    /// Raw distance for nearest-neighbour queries, fused RRF score for hybrid.
    rank_value: f64,
}

impl HitRow {
    fn into_result(self, score: f32, query: &SearchQuery) -> SearchResult {
        SearchResult {
            id: self.id,
            score,
            content: query.include_content.then_some(self.content),
            metadata: query.include_metadata.then_some(self.metadata.0),
            embedding: if query.include_embedding {
                self.embedding.map(|v| v.to_vec())
            } else {
                None
            },
        }
    }
}

impl PgVectorProvider {
    /// Run a ranked query, applying `SET LOCAL` ANN tuning in a transaction
    /// when the index configuration asks for it.
    async fn fetch_ranked<'q, O>(
        &self,
        collection: &str,
        operation: &str,
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
        limit: i64,
    ) -> Result<Vec<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let pool = self.pool().await?;
        let fail = |e| map_sqlx(e, operation, Some(collection));

        match sql::session_tuning(&self.config.index, limit) {
            Some(tuning) => {
                let mut tx = pool.begin().await.map_err(fail)?;
                (&mut *tx)
                    .execute(sqlx::raw_sql(&tuning))
                    .await
                    .map_err(fail)?;
                let rows = query.fetch_all(&mut *tx).await.map_err(fail)?;
                tx.commit().await.map_err(fail)?;
                Ok(rows)
            }
            None => query.fetch_all(&pool).await.map_err(fail),
        }
    }

    fn embedding_column(include: bool) -> &'static str {
        if include {
            "embedding"
        } else {
            "NULL::vector"
        }
    }

    pub(crate) async fn nearest(
        &self,
        collection: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>> {
        let names = self.names(collection)?;
        let op = sql::distance_operator(self.metric);
        let limit = clamp_limit(query.top_k);
        let filter = query
            .active_filter()
            .map(|f| f.to_sql(3))
            .unwrap_or_default();

        let statement = format!(
            "SELECT id, content, metadata, {embedding} AS embedding, \
                    (embedding {op} $1) AS rank_value \
             FROM {table}{filter} \
             ORDER BY embedding {op} $1 \
             LIMIT $2",
            embedding = Self::embedding_column(query.include_embedding),
            table = names.table,
            filter = filter.where_clause(),
        );
        let prepared = bind_filter(
            sqlx::query_as::<_, HitRow>(&statement)
                .bind(Vector::from(query.embedding.clone()))
                .bind(limit),
            &filter.params,
        );
        let rows = self.fetch_ranked(collection, "search", prepared, limit).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let score = distance_to_similarity(self.metric, row.rank_value);
                (row, score)
            })
            .filter(|(_, score)| query.accepts(*score))
            .map(|(row, score)| row.into_result(score, query))
            .collect())
    }

    /// Weighted reciprocal-rank fusion of a vector ranking and a full-text
    /// ranking over the same filtered rows.
    ///
    /// Each list is truncated to `top_k * hybrid_fetch_multiplier`; a row
    /// missing from one list counts as ranked just past that limit. The fused
    /// score is multiplied by `K + 1` so a row ranked first in both lists
    /// scores exactly 1. This is [`fusion::fused_score`] evaluated in SQL.
    pub(crate) async fn hybrid(
        &self,
        collection: &str,
        query: &HybridQuery,
    ) -> Result<Vec<SearchResult>> {
        let base = &query.query;
        let names = self.names(collection)?;
        let op = sql::distance_operator(self.metric);
        let limit = clamp_limit(base.top_k);
        let fetch = clamp_limit(base.top_k.saturating_mul(self.tuning.hybrid_fetch_multiplier));
        let tsv = sql::tsvector_expr(&self.config.text_search_config);
        let ts_config = sql::quote_literal(&self.config.text_search_config);
        let filter = base
            .active_filter()
            .map(|f| f.to_sql(7))
            .unwrap_or_default();

        // $1 query vector, $2 text, $3 per-list fetch limit, $4 K, $5 alpha,
        // $6 result limit, $7.. filter parameters.
        let statement = format!(
            r#"WITH vector_ranked AS (
                SELECT id, ROW_NUMBER() OVER (ORDER BY embedding {op} $1) AS rank
                FROM {table}{where_filter}
                ORDER BY embedding {op} $1
                LIMIT $3
            ),
            text_ranked AS (
                SELECT id, ROW_NUMBER() OVER (ORDER BY ts_rank_cd({tsv}, q) DESC, id) AS rank
                FROM {table}, plainto_tsquery({ts_config}::regconfig, $2) AS q
                WHERE {tsv} @@ q{and_filter}
                ORDER BY ts_rank_cd({tsv}, q) DESC, id
                LIMIT $3
            ),
            fused AS (
                SELECT COALESCE(v.id, t.id) AS id,
                       $5 / ($4 + COALESCE(v.rank, $3 + 1))
                         + (1 - $5) / ($4 + COALESCE(t.rank, $3 + 1)) AS rrf
                FROM vector_ranked v
                FULL OUTER JOIN text_ranked t ON v.id = t.id
            )
            SELECT d.id, d.content, d.metadata, {embedding} AS embedding,
                   f.rrf * ($4 + 1) AS rank_value
            FROM fused f
            JOIN {table} d ON d.id = f.id
            ORDER BY f.rrf DESC, d.id
            LIMIT $6"#,
            table = names.table,
            where_filter = filter.where_clause(),
            and_filter = filter.and_clause(),
            embedding = if base.include_embedding {
                "d.embedding"
            } else {
                "NULL::vector"
            },
        );
        let prepared = bind_filter(
            sqlx::query_as::<_, HitRow>(&statement)
                .bind(Vector::from(base.embedding.clone()))
                .bind(query.text.as_str())
                .bind(fetch)
                .bind(self.tuning.rrf_k)
                .bind(f64::from(query.alpha))
                .bind(limit),
            &filter.params,
        );
        let rows = self
            .fetch_ranked(collection, "hybrid search", prepared, fetch)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let score = fusion::unit_score(row.rank_value);
                (row, score)
            })
            .filter(|(_, score)| base.accepts(*score))
            .map(|(row, score)| row.into_result(score, base))
            .collect())
    }

    /// Fetch `fetch_k` nearest neighbours with their vectors and re-rank them
    /// in process. Each result's score is its relevance to the query.
    pub(crate) async fn mmr(&self, collection: &str, query: &MmrQuery) -> Result<Vec<SearchResult>> {
        let base = &query.query;
        let fetch_k = query.effective_fetch_k(self.tuning.mmr_fetch_multiplier);

        let mut candidates_query = base
            .clone()
            .include_embedding(true)
            .include_content(true)
            .include_metadata(true);
        candidates_query.top_k = fetch_k;
        candidates_query.score_threshold = None;
        let candidates = self.nearest(collection, &candidates_query).await?;

        let pool: Vec<MmrCandidate<'_>> = candidates
            .iter()
            .map(|c| MmrCandidate {
                relevance: c.score,
                embedding: c.embedding.as_deref().unwrap_or(&[]),
            })
            .collect();
        let picked = maximal_marginal_relevance(&pool, base.top_k, query.lambda, base.score_threshold);

        let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
        Ok(picked
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .map(|mut hit| {
                if !base.include_content {
                    hit.content = None;
                }
                if !base.include_metadata {
                    hit.metadata = None;
                }
                if !base.include_embedding {
                    hit.embedding = None;
                }
                hit
            })
            .collect())
    }
}
