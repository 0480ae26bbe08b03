use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open, string-keyed document metadata.
pub type Metadata = serde_json::Map<String, Value>;

/// Well-known metadata keys. Any other key is allowed as well.
pub mod metadata_keys {
    /// Path or URI the content was taken from.
    pub const SOURCE: &str = "source";
    /// Programming or natural language of the content.
    pub const LANGUAGE: &str = "language";
    pub const START_LINE: &str = "start_line";
    pub const END_LINE: &str = "end_line";
}

/// A content-bearing embedding stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a collection.
    pub id: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Set by the backend on reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the backend on reads; bumped on every overwrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
            content: String::new(),
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set a single metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
