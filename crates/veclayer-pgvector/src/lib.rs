//! PostgreSQL + pgvector provider for Veclayer.
//!
//! [`PgVectorProvider`] implements [`VectorProvider`](veclayer_core::VectorProvider)
//! on top of a `sqlx` connection pool. Collections are tables, metadata filters
//! compile to parameterized JSONB predicates, hybrid search fuses an ANN ranking
//! with a `ts_rank_cd` ranking by reciprocal rank in a single statement, and
//! MMR re-ranks an oversampled candidate pool in process.

mod crud;
mod error;
mod provider;
mod search;
pub mod sql;

pub use crud::UPSERT_BATCH_SIZE;
pub use provider::PgVectorProvider;
pub use veclayer_core::{DistanceMetric, IndexConfig, PgVectorConfig};
