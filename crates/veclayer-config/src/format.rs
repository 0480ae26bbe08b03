use std::fmt;
use std::path::Path;

use serde_json::Value;
use veclayer_core::{Result, VectorError};

/// Configuration syntaxes a store config can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Every format, in discovery preference order.
    pub const ALL: [ConfigFormat; 3] = [Self::Toml, Self::Json, Self::Yaml];

    /// File extensions (lowercase, without the dot) that imply this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Toml => &["toml"],
            Self::Json => &["json"],
            Self::Yaml => &["yaml", "yml"],
        }
    }

    /// Format implied by the extension of `path`, case-insensitively.
    pub fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Parse `content` into a format-neutral JSON tree.
    pub fn parse(self, content: &str) -> Result<Value> {
        let parsed = match self {
            Self::Toml => toml::from_str::<Value>(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yml::from_str::<Value>(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| VectorError::invalid_config(None, format!("{self} parse error: {e}")))
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        })
    }
}
