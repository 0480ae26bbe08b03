use veclayer_core::{ProviderKind, VectorError};

const PROVIDER: ProviderKind = ProviderKind::Pgvector;

/// Map a sqlx error raised while running `operation`.
///
/// `collection` names the collection the statement targeted, if any, so an
/// undefined table or a duplicate one can be reported as such.
pub(crate) fn map_sqlx(err: sqlx::Error, operation: &str, collection: Option<&str>) -> VectorError {
    let message = format!("{operation} failed: {err}");
    let mapped = match &err {
        sqlx::Error::Database(db) => match (db.code().as_deref(), collection) {
            // undefined_table
            (Some("42P01"), Some(name)) => VectorError::collection_not_found(PROVIDER, name),
            // duplicate_table, unique_violation on the registry
            (Some("42P07" | "23505"), Some(name)) => {
                VectorError::collection_exists(PROVIDER, name)
            }
            (Some(code), _) if is_connection_sqlstate(code) => {
                VectorError::connection(PROVIDER, message)
            }
            _ => VectorError::provider(PROVIDER, message),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => VectorError::connection(PROVIDER, message),
        sqlx::Error::Configuration(_) => VectorError::invalid_config(Some(PROVIDER), message),
        _ => VectorError::provider(PROVIDER, message),
    };
    mapped.with_source(err)
}

/// Class 08 (connection exception), 28 (invalid authorization), 53300
/// (too many connections) and 57P01..57P03 (server shutting down).
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("28")
        || matches!(code, "53300" | "57P01" | "57P02" | "57P03")
}
