//! Resolved runtime settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::llm::LlmConfig;

use super::{APP_NAME, DEFAULT_POLL_INTERVAL_SECS};

/// Settings after merging the config file, environment and CLI flags.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for persisted collections and archived originals.
    pub data_dir: PathBuf,
    /// Base that archived `filePath`s are resolved against when opening.
    pub base_url: Url,
    /// Periodic view refresh interval.
    pub poll_interval: Duration,
    /// Keep uploaded originals under `files_dir()`.
    pub archive_originals: bool,
    pub llm: LlmConfig,
    /// Config file the settings came from, if any.
    pub config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            base_url: directory_url(&data_dir),
            data_dir,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            archive_originals: true,
            llm: LlmConfig::default(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Directory holding the persisted collections.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Directory holding archived originals; mirrors the `/files` URL prefix.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}

pub(super) fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_NAME)
}

/// `file://` URL for a directory. Relative paths fall back to the filesystem root.
pub(super) fn directory_url(dir: &Path) -> Url {
    Url::from_directory_path(dir).unwrap_or_else(|_| {
        Url::parse("file:///").expect("constant file URL is valid")
    })
}
