//! Configuration management for doctag using the prefer crate.

mod loader;
mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::LlmConfig;

pub use loader::{load_settings, resolve_settings, EnvOverrides, LoadOptions};
pub use settings::Settings;

/// Application name used for config discovery and the default data directory.
pub const APP_NAME: &str = "doctag";

/// Default interval for periodic view refreshes, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path (relative paths are resolved against the config file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Base URL that archived `filePath`s are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Seconds between periodic view refreshes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    /// Keep a copy of uploaded originals under `<data_dir>/files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_originals: Option<bool>,
    /// Remote tag/summary generation.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    ///
    /// Falls back to defaults (with environment overrides) when no file is
    /// found or the discovered file cannot be parsed.
    pub async fn load() -> Self {
        match prefer::load(APP_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("{}; using defaults", e);
                        Self::default_with_env()
                    }
                },
                None => Self::default_with_env(),
            },
            Err(_) => {
                debug!("No {} config file found, using defaults", APP_NAME);
                Self::default_with_env()
            }
        }
    }

    /// Default config with environment overrides applied.
    pub fn default_with_env() -> Self {
        // LlmConfig's Default already layers the environment over its base
        Self::default()
    }

    /// Load configuration from a specific file. The format follows the extension
    /// (`toml`, `yaml`/`yml`, anything else is JSON).
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        config.llm = config.llm.with_env_overrides();
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_err("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_err("JSON", e.to_string())),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - `~` is expanded
    /// - Absolute paths are returned as-is
    /// - Relative paths are joined to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}
