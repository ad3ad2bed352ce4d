//! Configuration loading and merging logic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use url::Url;

use super::settings::{default_data_dir, directory_url};
use super::{Config, ConfigError, Settings, APP_NAME, DEFAULT_POLL_INTERVAL_SECS};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Settings-level environment overrides. `LlmConfig` handles its own.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub data_dir: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|s| !s.trim().is_empty());
        Self {
            data_dir: var("DOCTAG_DATA_DIR"),
            base_url: var("DOCTAG_BASE_URL"),
        }
    }
}

/// Look for a config file inside the data directory.
fn find_config_in_data_dir(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["toml", "yaml", "yml", "json"];
    let basenames = [APP_NAME, "config"];

    for basename in basenames {
        for ext in extensions {
            let path = data_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    }
}

async fn load_file_config(options: &LoadOptions) -> Result<Config, ConfigError> {
    // Priority 1: Explicit --config flag; a broken explicit file is an error
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path).await;
    }

    // Priority 2: Config inside the data dir
    if let Some(ref data_dir) = options.data_dir {
        if let Some(config_path) = find_config_in_data_dir(data_dir) {
            debug!("Found config in data dir: {}", config_path.display());
            return Config::load_from_path(&config_path).await;
        }
    }

    // Priority 3: Auto-discover via prefer
    Ok(Config::load().await)
}

/// Load settings: config file, then environment, then CLI flags.
pub async fn load_settings(options: LoadOptions) -> Result<Settings, ConfigError> {
    let config = load_file_config(&options).await?;
    resolve_settings(&config, &options, &EnvOverrides::from_env())
}

/// Merge a loaded config with overrides.
///
/// `data_dir`: CLI flag, then `DOCTAG_DATA_DIR`, then the config file (relative
/// to the file's directory), then `<data_local_dir>/doctag`.
/// `base_url`: `DOCTAG_BASE_URL`, then the config file, then the data directory
/// as a `file://` URL.
pub fn resolve_settings(
    config: &Config,
    options: &LoadOptions,
    env: &EnvOverrides,
) -> Result<Settings, ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());

    let data_dir = if let Some(ref dir) = options.data_dir {
        absolutize(dir.clone())
    } else if let Some(ref dir) = env.data_dir {
        config.resolve_path(dir, &cwd)
    } else if let Some(ref dir) = config.data_dir {
        config.resolve_path(dir, &base_dir)
    } else {
        default_data_dir()
    };

    let base_url = match env.base_url.as_deref().or(config.base_url.as_deref()) {
        Some(raw) => parse_base_url(raw)?,
        None => directory_url(&data_dir),
    };

    let settings = Settings {
        data_dir,
        base_url,
        poll_interval: Duration::from_secs(
            config
                .poll_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        ),
        archive_originals: config.archive_originals.unwrap_or(true),
        llm: config.llm.clone(),
        config_path: config.source_path.clone(),
    };
    debug!(
        "Resolved data dir {} and base URL {}",
        settings.data_dir.display(),
        settings.base_url
    );
    Ok(settings)
}

/// Parse a base URL, adding the trailing `/` that keeps its path when joining.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    let url = Url::parse(&with_slash).map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(url)
}
