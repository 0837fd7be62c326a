//! Common test utilities for gog-dl integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod fakes;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fakes::*;

use gog_dl::{Config, DownloadManager};
use tempfile::TempDir;

/// Config rooted in a scratch directory
pub fn scratch_config(dir: &std::path::Path, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.join("games");
    config.download.max_concurrent_downloads = max_concurrent;
    config.persistence.history_path = dir.join("download_history.json");
    config.persistence.database_path = dir.join("gog-dl.db");
    config
}

/// Create a manager over a fresh scratch directory
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub async fn create_manager(max_concurrent: usize) -> (DownloadManager, FakeCatalogue, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let catalogue = FakeCatalogue::default();
    let manager = DownloadManager::new(
        scratch_config(temp_dir.path(), max_concurrent),
        catalogue.services(),
    )
    .await
    .expect("Failed to create manager");
    (manager, catalogue, temp_dir)
}

/// Route `tracing` output to the test harness when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
