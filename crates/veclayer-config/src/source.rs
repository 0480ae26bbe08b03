use std::path::{Path, PathBuf};

use veclayer_core::{Result, StoreConfig, VectorError};

use crate::format::ConfigFormat;

/// Environment variable naming a config file; checked before the default
/// locations during discovery.
pub const CONFIG_PATH_ENV: &str = "VECLAYER_CONFIG";

/// Configuration text together with its syntax and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfig {
    pub content: String,
    pub format: ConfigFormat,
    /// Human-readable origin, used in errors and log lines.
    pub origin: String,
}

/// Something that can hand out store configuration.
///
/// Implemented for files and in-memory strings; a remote configuration
/// service only needs to provide [`ConfigSource::fetch`].
pub trait ConfigSource: Send + Sync {
    fn fetch(&self) -> Result<RawConfig>;

    /// Fetch and interpret the configuration as a [`StoreConfig`].
    ///
    /// The backend named under `provider` is checked before anything else,
    /// so an unknown backend reports `ProviderNotSupported` even when other
    /// fields are malformed.
    fn load(&self) -> Result<StoreConfig> {
        let raw = self.fetch()?;
        let config = crate::parse_store_config(&raw.content, raw.format).inspect_err(|e| {
            tracing::warn!(origin = %raw.origin, code = e.code(), error = %e, "invalid store config");
        })?;
        tracing::debug!(
            origin = %raw.origin,
            provider = %config.provider_kind(),
            dimensions = config.dimensions,
            "loaded store config"
        );
        Ok(config)
    }
}

/// Store configuration in a file. The format follows the extension unless
/// set explicitly.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    format: Option<ConfigFormat>,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn fetch(&self) -> Result<RawConfig> {
        let origin = self.path.display().to_string();
        let format = self
            .format
            .or_else(|| ConfigFormat::for_path(&self.path))
            .ok_or_else(|| {
                VectorError::invalid_config(
                    None,
                    format!("{origin}: unknown config extension, set the format explicitly"),
                )
            })?;
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            VectorError::invalid_config(None, format!("{origin}: {e}")).with_source(e)
        })?;
        Ok(RawConfig {
            content,
            format,
            origin,
        })
    }
}

/// Store configuration held in memory.
#[derive(Debug, Clone)]
pub struct StringConfigSource {
    content: String,
    format: ConfigFormat,
}

impl StringConfigSource {
    pub fn new(content: impl Into<String>, format: ConfigFormat) -> Self {
        Self {
            content: content.into(),
            format,
        }
    }
}

impl ConfigSource for StringConfigSource {
    fn fetch(&self) -> Result<RawConfig> {
        Ok(RawConfig {
            content: self.content.clone(),
            format: self.format,
            origin: format!("inline {}", self.format),
        })
    }
}

/// Locate a store config file.
///
/// An explicit `path` must exist. Otherwise the file named by
/// `$VECLAYER_CONFIG` is used, then the first of `./veclayer.<ext>` and
/// `~/.veclayer/config.<ext>` that exists, trying every extension of
/// [`ConfigFormat::ALL`] in order.
pub fn discover(path: Option<&Path>) -> Result<FileConfigSource> {
    if let Some(path) = path {
        return existing(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return existing(PathBuf::from(path));
    }

    let mut tried = candidates(Path::new("."), "veclayer");
    if let Some(home) = dirs::home_dir() {
        tried.extend(candidates(&home.join(".veclayer"), "config"));
    }
    if let Some(found) = tried.iter().find(|p| p.is_file()) {
        return Ok(FileConfigSource::new(found.clone()));
    }

    let tried: Vec<String> = tried.iter().map(|p| p.display().to_string()).collect();
    Err(VectorError::invalid_config(
        None,
        format!("no config file found, tried: {}", tried.join(", ")),
    ))
}

fn existing(path: PathBuf) -> Result<FileConfigSource> {
    if path.is_file() {
        Ok(FileConfigSource::new(path))
    } else {
        Err(VectorError::invalid_config(
            None,
            format!("config file not found: {}", path.display()),
        ))
    }
}

fn candidates(dir: &Path, stem: &str) -> Vec<PathBuf> {
    ConfigFormat::ALL
        .into_iter()
        .flat_map(ConfigFormat::extensions)
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .collect()
}
