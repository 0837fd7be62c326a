//! Configuration types for gog-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Download behavior configuration (directories, concurrency, pruning)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default base directory for requests that don't name one (default: "./games")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum simultaneously active downloads; extra requests are queued (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Thread count used when a caller has no preference (default: 5)
    #[serde(default = "default_threads")]
    pub default_threads: usize,

    /// Lowest accepted thread count (default: 1)
    #[serde(default = "default_min_threads")]
    pub min_threads: usize,

    /// Highest accepted thread count (default: 20)
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Prune superseded installers after every completed download,
    /// regardless of the per-request flag (default: false). Also the
    /// default of `prune_old_versions` in `DownloadManager::new_request`.
    #[serde(default)]
    pub prune_after_download: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            default_threads: default_threads(),
            min_threads: default_min_threads(),
            max_threads: default_max_threads(),
            prune_after_download: false,
        }
    }
}

/// Which backend stores terminal task history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackend {
    /// A JSON array rewritten in full on every change (default)
    #[default]
    Json,
    /// A SQLite table rewritten inside a transaction on every change
    Sqlite,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// History backend (default: json)
    #[serde(default)]
    pub history_backend: HistoryBackend,

    /// History file path for the JSON backend (default: "./download_history.json")
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Database path for the SQLite backend (default: "./gog-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            history_backend: HistoryBackend::default(),
            history_path: default_history_path(),
            database_path: default_database_path(),
        }
    }
}

/// Progress presentation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Number of throughput samples averaged into the published speed (default: 5)
    #[serde(default = "default_speed_window")]
    pub speed_window: usize,

    /// Files listed individually in the file status text (default: 2)
    #[serde(default = "default_max_file_lines")]
    pub max_file_lines: usize,

    /// File names longer than this are middle-truncated (default: 40)
    #[serde(default = "default_max_file_name_len")]
    pub max_file_name_len: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            speed_window: default_speed_window(),
            max_file_lines: default_max_file_lines(),
            max_file_name_len: default_max_file_name_len(),
        }
    }
}

/// Main configuration for DownloadManager
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig) - directories, concurrency, thread bounds, pruning
/// - [`persistence`](PersistenceConfig) - history backend and locations
/// - [`progress`](ProgressConfig) - speed smoothing and status text shape
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// History storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Progress presentation
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl Config {
    /// Load configuration from a JSON file, filling missing fields with defaults
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path).await?;
        let config: Config = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1",
                "max_concurrent_downloads",
            ));
        }
        if self.download.min_threads == 0 {
            return Err(config_error("min_threads must be at least 1", "min_threads"));
        }
        if self.download.min_threads > self.download.max_threads {
            return Err(config_error(
                "min_threads must not exceed max_threads",
                "min_threads",
            ));
        }
        if !(self.download.min_threads..=self.download.max_threads)
            .contains(&self.download.default_threads)
        {
            return Err(config_error(
                "default_threads must lie within min_threads..=max_threads",
                "default_threads",
            ));
        }
        if self.progress.speed_window == 0 {
            return Err(config_error("speed_window must be at least 1", "speed_window"));
        }
        // Room for at least one character on each side of the "..."
        if self.progress.max_file_name_len < 5 {
            return Err(config_error(
                "max_file_name_len must be at least 5",
                "max_file_name_len",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("games")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_threads() -> usize {
    5
}

fn default_min_threads() -> usize {
    1
}

fn default_max_threads() -> usize {
    20
}

fn default_history_path() -> PathBuf {
    PathBuf::from("download_history.json")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("gog-dl.db")
}

fn default_speed_window() -> usize {
    5
}

fn default_max_file_lines() -> usize {
    2
}

fn default_max_file_name_len() -> usize {
    40
}
