use std::fmt;

use serde_json::{json, Value};
use thiserror::Error;

use crate::ProviderKind;

/// Boxed error used as the wrapped cause of a [`VectorError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across all Veclayer crates.
pub type Result<T> = std::result::Result<T, VectorError>;

/// Machine-readable classification of a [`VectorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad dimensions, missing provider sub-config, unresolvable connection string.
    InvalidConfig,
    /// The provider discriminant is not one of the supported backends.
    ProviderNotSupported,
    /// An operation was attempted before `initialize()`.
    NotInitialized,
    CollectionNotFound,
    CollectionExists,
    /// Collection name is empty or contains characters outside `[A-Za-z0-9_-]`.
    InvalidCollectionName,
    /// Document is structurally invalid (empty id, non-finite embedding values).
    InvalidDocument,
    /// Embedding length differs from the configured dimensions.
    InvalidEmbeddingDimensions,
    /// Non-positive `top_k`, out-of-range threshold/alpha/lambda, empty hybrid text.
    InvalidQuery,
    /// Transport, pool or authentication failure reaching the backend.
    Connection,
    /// A provider hook did not finish within the configured deadline.
    Timeout,
    /// Generic backend failure.
    Provider,
    /// The backend is a declared provider without a real implementation.
    ProviderNotImplemented,
}

impl ErrorKind {
    /// Stable, machine-readable code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::ProviderNotSupported => "PROVIDER_NOT_SUPPORTED",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::CollectionNotFound => "COLLECTION_NOT_FOUND",
            Self::CollectionExists => "COLLECTION_EXISTS",
            Self::InvalidCollectionName => "INVALID_COLLECTION_NAME",
            Self::InvalidDocument => "INVALID_DOCUMENT",
            Self::InvalidEmbeddingDimensions => "INVALID_EMBEDDING_DIMENSIONS",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::Connection => "CONNECTION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Provider => "PROVIDER_ERROR",
            Self::ProviderNotImplemented => "PROVIDER_NOT_IMPLEMENTED",
        }
    }

    /// Whether the kind is raised by input validation (before any I/O).
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            Self::InvalidCollectionName
                | Self::InvalidDocument
                | Self::InvalidEmbeddingDimensions
                | Self::InvalidQuery
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error type shared by the orchestrator, the factory and every provider.
///
/// Carries a human-readable message, a [`ErrorKind`] (and thus a stable
/// code), the originating provider when known, optional structured context,
/// an optional wrapped cause and a `retryable` flag. Nothing inside Veclayer
/// retries on its own; the flag is advice for the caller.
#[derive(Debug, Error)]
#[error("{}{message}", provider_prefix(.provider))]
pub struct VectorError {
    kind: ErrorKind,
    provider: Option<ProviderKind>,
    message: String,
    context: Option<Value>,
    #[source]
    source: Option<BoxError>,
    retryable: bool,
}

fn provider_prefix(provider: &Option<ProviderKind>) -> String {
    match provider {
        Some(p) => format!("[{p}] "),
        None => String::new(),
    }
}

impl VectorError {
    /// Build an error of the given kind. `retryable` defaults to `true` only
    /// for [`ErrorKind::Connection`] and [`ErrorKind::Timeout`].
    pub fn new(kind: ErrorKind, provider: Option<ProviderKind>, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider,
            message: message.into(),
            context: None,
            source: None,
            retryable: matches!(kind, ErrorKind::Connection | ErrorKind::Timeout),
        }
    }

    pub fn invalid_config(provider: Option<ProviderKind>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, provider, message)
    }

    pub fn provider_not_supported(name: &str) -> Self {
        Self::new(
            ErrorKind::ProviderNotSupported,
            None,
            format!("provider '{name}' is not supported"),
        )
        .with_context(json!({ "provider": name }))
    }

    pub fn not_initialized(provider: ProviderKind) -> Self {
        Self::new(
            ErrorKind::NotInitialized,
            Some(provider),
            "vector store is not initialized; call initialize() first",
        )
    }

    pub fn collection_not_found(provider: ProviderKind, collection: &str) -> Self {
        Self::new(
            ErrorKind::CollectionNotFound,
            Some(provider),
            format!("collection '{collection}' does not exist"),
        )
        .with_context(json!({ "collection": collection }))
    }

    pub fn collection_exists(provider: ProviderKind, collection: &str) -> Self {
        Self::new(
            ErrorKind::CollectionExists,
            Some(provider),
            format!("collection '{collection}' already exists"),
        )
        .with_context(json!({ "collection": collection }))
    }

    pub fn invalid_collection_name(provider: ProviderKind, name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidCollectionName,
            Some(provider),
            format!("invalid collection name '{name}': expected non-empty [A-Za-z0-9_-]+"),
        )
        .with_context(json!({ "collection": name }))
    }

    pub fn invalid_document(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDocument, Some(provider), message)
    }

    pub fn dimension_mismatch(provider: ProviderKind, expected: usize, actual: usize) -> Self {
        Self::new(
            ErrorKind::InvalidEmbeddingDimensions,
            Some(provider),
            format!("embedding has {actual} dimensions, expected {expected}"),
        )
        .with_context(json!({ "expected": expected, "actual": actual }))
    }

    pub fn invalid_query(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidQuery, Some(provider), message)
    }

    pub fn connection(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, Some(provider), message)
    }

    pub fn timeout(provider: ProviderKind, operation: &str, timeout_ms: u64) -> Self {
        Self::new(
            ErrorKind::Timeout,
            Some(provider),
            format!("{operation} did not complete within {timeout_ms}ms"),
        )
        .with_context(json!({ "operation": operation, "timeoutMs": timeout_ms }))
    }

    pub fn provider(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, Some(provider), message)
    }

    pub fn not_implemented(provider: ProviderKind, operation: &str) -> Self {
        Self::new(
            ErrorKind::ProviderNotImplemented,
            Some(provider),
            format!("{operation} is not implemented for provider '{provider}'"),
        )
        .with_context(json!({ "operation": operation }))
    }

    /// Attach structured context (replaces any existing context).
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Override the default retryability of the kind.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.provider
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}
