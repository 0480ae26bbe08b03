//! SQL text helpers.
//!
//! Every identifier that reaches a statement goes through [`quote_ident`],
//! and every number interpolated into SQL (index parameters, session
//! settings) is clamped first. Values always travel as bound parameters.

use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryAs;
use sqlx::types::Json;
use veclayer_core::{
    DistanceMetric, ErrorKind, IndexConfig, ProviderKind, Result, SqlParam, VectorError,
};

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;
/// Upper bound for any `LIMIT` the provider issues.
pub const MAX_LIMIT: usize = 10_000;
/// Bounds for `hnsw.ef_search`, `ivfflat.probes` and index build parameters.
pub const MIN_TUNING: u32 = 1;
pub const MAX_TUNING: u32 = 1_000;
/// pgvector's built-in `hnsw.ef_search`.
pub const DEFAULT_EF_SEARCH: u32 = 40;

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, escaping embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Clamp a requested row count into `1..=MAX_LIMIT`.
pub fn clamp_limit(n: usize) -> i64 {
    n.clamp(1, MAX_LIMIT) as i64
}

pub fn clamp_tuning(n: u32) -> u32 {
    n.clamp(MIN_TUNING, MAX_TUNING)
}

/// pgvector distance operator for a metric.
pub fn distance_operator(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "<=>",
        DistanceMetric::Euclidean => "<->",
        DistanceMetric::DotProduct => "<#>",
    }
}

/// pgvector operator class matching [`distance_operator`].
pub fn ops_class(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "vector_cosine_ops",
        DistanceMetric::Euclidean => "vector_l2_ops",
        DistanceMetric::DotProduct => "vector_ip_ops",
    }
}

/// Table and index naming under a schema and table prefix.
#[derive(Debug, Clone)]
pub struct Naming {
    schema: String,
    prefix: String,
}

/// Resolved names for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// Schema-qualified, quoted table name.
    pub table: String,
    pub ann_index: String,
    pub metadata_index: String,
    pub text_index: String,
}

impl Naming {
    pub fn new(schema: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            prefix: prefix.into(),
        }
    }

    pub fn schema(&self) -> String {
        quote_ident(&self.schema)
    }

    /// The private table listing provisioned collections.
    pub fn registry(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schema),
            quote_ident(&format!("{}registry", self.prefix))
        )
    }

    /// Names for `collection`. Collection tables live under `<prefix>col_`
    /// so no collection name can collide with the registry.
    pub fn collection(&self, collection: &str) -> Result<CollectionNames> {
        let bare = format!("{}col_{collection}", self.prefix);
        let ann_index = format!("{bare}_vec_idx");
        let metadata_index = format!("{bare}_meta_idx");
        let text_index = format!("{bare}_fts_idx");

        // The longest derived identifier decides whether the name fits.
        let longest = ann_index.len().max(metadata_index.len()).max(text_index.len());
        if longest > MAX_IDENTIFIER_LEN {
            let max_len = MAX_IDENTIFIER_LEN.saturating_sub(longest - collection.len());
            return Err(VectorError::new(
                ErrorKind::InvalidCollectionName,
                Some(ProviderKind::Pgvector),
                format!("collection name '{collection}' is longer than {max_len} characters"),
            )
            .with_context(serde_json::json!({
                "collection": collection,
                "max_collection_name_len": max_len,
            })));
        }

        Ok(CollectionNames {
            table: format!("{}.{}", quote_ident(&self.schema), quote_ident(&bare)),
            ann_index: quote_ident(&ann_index),
            metadata_index: quote_ident(&metadata_index),
            text_index: quote_ident(&text_index),
        })
    }
}

/// `CREATE INDEX` statement for the ANN index of a collection.
pub fn ann_index_ddl(names: &CollectionNames, metric: DistanceMetric, index: &IndexConfig) -> String {
    let ops = ops_class(metric);
    match index {
        IndexConfig::Hnsw {
            m, ef_construction, ..
        } => format!(
            "CREATE INDEX {idx} ON {table} USING hnsw (embedding {ops}) \
             WITH (m = {m}, ef_construction = {ef})",
            idx = names.ann_index,
            table = names.table,
            m = (*m).clamp(2, 100),
            ef = clamp_tuning(*ef_construction),
        ),
        IndexConfig::IvfFlat { lists, .. } => format!(
            "CREATE INDEX {idx} ON {table} USING ivfflat (embedding {ops}) WITH (lists = {lists})",
            idx = names.ann_index,
            table = names.table,
            lists = (*lists).clamp(1, 32_768),
        ),
    }
}

/// `to_tsvector(...)` over the content column with a fixed configuration.
///
/// The configuration is a literal (not a parameter) so the expression
/// matches the full-text index definition.
pub fn tsvector_expr(text_search_config: &str) -> String {
    format!(
        "to_tsvector({}::regconfig, content)",
        quote_literal(text_search_config)
    )
}

/// `SET LOCAL` statement tuning the ANN scan for one query, if any.
///
/// HNSW returns at most `ef_search` rows, so it is raised to the row limit
/// when needed.
pub fn session_tuning(index: &IndexConfig, limit: i64) -> Option<String> {
    match index {
        IndexConfig::Hnsw { ef_search, .. } => {
            let wanted = u32::try_from(limit).unwrap_or(MAX_TUNING);
            let ef = clamp_tuning(ef_search.unwrap_or(DEFAULT_EF_SEARCH).max(wanted));
            (ef != DEFAULT_EF_SEARCH).then(|| format!("SET LOCAL hnsw.ef_search = {ef}"))
        }
        IndexConfig::IvfFlat { probes, .. } => {
            probes.map(|p| format!("SET LOCAL ivfflat.probes = {}", clamp_tuning(p)))
        }
    }
}

/// Bind translated filter parameters, in placeholder order.
pub fn bind_filter<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: &'q [SqlParam],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(text) => query.bind(text.as_str()),
            SqlParam::Number(number) => query.bind(*number),
            SqlParam::Json(value) => query.bind(Json(value)),
        };
    }
    query
}
