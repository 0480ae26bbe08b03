//! Configuration loading for Veclayer.
//!
//! A [`StoreConfig`] can be read from TOML, JSON or YAML, from a file, an
//! in-memory string, or a discovered file (`$VECLAYER_CONFIG`, then
//! `./veclayer.*`, then `~/.veclayer/config.*`):
//!
//! ```toml
//! dimensions = 1536
//! distance_metric = "cosine"
//!
//! [provider.pgvector]
//! connection_string_env = "DATABASE_URL"
//! index = { type = "hnsw", m = 16, ef_construction = 64 }
//!
//! [cache]
//! ttl_secs = 120
//! ```
//!
//! The `provider` table must hold exactly one key naming the backend. An
//! unknown name fails with `ProviderNotSupported` before the rest of the
//! document is interpreted.

mod format;
mod source;

pub use format::ConfigFormat;
pub use source::{
    discover, ConfigSource, FileConfigSource, RawConfig, StringConfigSource, CONFIG_PATH_ENV,
};

use std::path::Path;

use serde_json::Value;
use veclayer_core::{ProviderKind, Result, StoreConfig, VectorError};

/// Parse a [`StoreConfig`] from text.
pub fn parse_store_config(content: &str, format: ConfigFormat) -> Result<StoreConfig> {
    let value = format.parse(content)?;
    let kind = provider_kind_of(&value)?;
    serde_json::from_value(value).map_err(|e| {
        VectorError::invalid_config(Some(kind), format!("invalid store config: {e}"))
    })
}

/// Discover a configuration file (see [`discover`]) and load it.
pub fn discover_store_config(path: Option<&Path>) -> Result<StoreConfig> {
    discover(path)?.load()
}

/// Read the provider discriminant without interpreting anything else.
fn provider_kind_of(value: &Value) -> Result<ProviderKind> {
    match value.get("provider") {
        None | Some(Value::Null) => Err(VectorError::invalid_config(
            None,
            "missing `provider` section",
        )),
        // `provider = "pgvector"` names the backend but carries no settings.
        Some(Value::String(name)) => {
            let kind: ProviderKind = name.parse()?;
            Err(VectorError::invalid_config(
                Some(kind),
                format!("provider `{kind}` requires a `provider.{kind}` section"),
            ))
        }
        Some(Value::Object(section)) => {
            let mut names = section.keys();
            match (names.next(), names.next()) {
                (Some(name), None) => name.parse(),
                (None, _) => Err(VectorError::invalid_config(
                    None,
                    "`provider` section is empty",
                )),
                (Some(_), Some(_)) => Err(VectorError::invalid_config(
                    None,
                    format!(
                        "`provider` section must name exactly one backend, found: {}",
                        section.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                )),
            }
        }
        Some(_) => Err(VectorError::invalid_config(
            None,
            "`provider` must be a table naming one backend",
        )),
    }
}
