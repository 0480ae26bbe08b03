use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::types::Json;
use veclayer_core::{Document, Metadata, MetadataFilter, Result};

use crate::error::map_sqlx;
use crate::sql::bind_filter;
use crate::PgVectorProvider;

/// Documents written per `INSERT` statement.
pub const UPSERT_BATCH_SIZE: usize = 100;

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    embedding: Vector,
    content: String,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            embedding: row.embedding.to_vec(),
            content: row.content,
            metadata: row.metadata.0,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

/// Keep only the last occurrence of each id, in input order.
///
/// `INSERT ... ON CONFLICT DO UPDATE` cannot touch the same row twice in one
/// statement.
pub(crate) fn dedup_last_by_id(documents: &[Document]) -> Vec<&Document> {
    let last: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| (doc.id.as_str(), i))
        .collect();
    documents
        .iter()
        .enumerate()
        .filter(|(i, doc)| last.get(doc.id.as_str()) == Some(i))
        .map(|(_, doc)| doc)
        .collect()
}

/// `($1, $2, $3, $4), ($5, $6, $7, $8), ...` for `rows` four-column rows.
fn values_placeholders(rows: usize) -> String {
    (0..rows)
        .map(|row| {
            let base = row * 4;
            format!("(${}, ${}, ${}, ${})", base + 1, base + 2, base + 3, base + 4)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl PgVectorProvider {
    pub(crate) async fn upsert_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<usize> {
        let names = self.names(collection)?;
        let pool = self.pool().await?;
        let fail = |e| map_sqlx(e, "upsert", Some(collection));

        let unique = dedup_last_by_id(documents);
        let mut tx = pool.begin().await.map_err(fail)?;

        for batch in unique.chunks(UPSERT_BATCH_SIZE) {
            let statement = format!(
                "INSERT INTO {table} (id, embedding, content, metadata) VALUES {values} \
                 ON CONFLICT (id) DO UPDATE SET \
                     embedding = EXCLUDED.embedding, \
                     content = EXCLUDED.content, \
                     metadata = EXCLUDED.metadata, \
                     updated_at = now()",
                table = names.table,
                values = values_placeholders(batch.len()),
            );

            let mut query = sqlx::query(&statement);
            for doc in batch {
                query = query
                    .bind(doc.id.as_str())
                    .bind(Vector::from(doc.embedding.clone()))
                    .bind(doc.content.as_str())
                    .bind(Json(&doc.metadata));
            }
            query.execute(&mut *tx).await.map_err(fail)?;

            tracing::trace!(
                backend = "pgvector",
                collection,
                batch = batch.len(),
                "upsert batch written"
            );
        }

        tx.commit().await.map_err(fail)?;
        Ok(unique.len())
    }

    pub(crate) async fn delete_documents(&self, collection: &str, ids: &[String]) -> Result<u64> {
        let names = self.names(collection)?;
        let pool = self.pool().await?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", names.table))
            .bind(ids)
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx(e, "delete", Some(collection)))?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn get_documents(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Document>> {
        let names = self.names(collection)?;
        let pool = self.pool().await?;

        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT id, embedding, content, metadata, created_at, updated_at \
             FROM {} WHERE id = ANY($1)",
            names.table
        ))
        .bind(ids)
        .fetch_all(&pool)
        .await
        .map_err(|e| map_sqlx(e, "get", Some(collection)))?;

        let mut by_id: HashMap<String, Document> = rows
            .into_iter()
            .map(|row| (row.id.clone(), Document::from(row)))
            .collect();
        // Request order; unknown ids are skipped, repeated ids yield one document.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub(crate) async fn count_documents(
        &self,
        collection: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<u64> {
        let names = self.names(collection)?;
        let pool = self.pool().await?;

        let filter = filter.map(|f| f.to_sql(1)).unwrap_or_default();
        let statement = format!("SELECT COUNT(*) FROM {}{}", names.table, filter.where_clause());
        let (count,): (i64,) = bind_filter(sqlx::query_as(&statement), &filter.params)
            .fetch_one(&pool)
            .await
            .map_err(|e| map_sqlx(e, "count", Some(collection)))?;
        Ok(count.max(0) as u64)
    }
}
