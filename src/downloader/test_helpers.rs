//! Shared test helpers: in-memory collaborators and DownloadManager builders.

use crate::config::Config;
use crate::downloader::DownloadManager;
use crate::error::{DownloadError, Error, Result};
use crate::metadata::GameRecord;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::services::{AuthService, MetadataStore, Services, TransferEngine, TransferJob};
use crate::types::{GameId, TaskState, TaskView};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

pub(crate) const TEST_TOKEN: &str = "token-123";

/// Installer metadata with one Windows installer at `version`
pub(crate) fn sample_metadata(title: &str, version: &str) -> String {
    serde_json::json!({
        "title": title,
        "downloads": [
            ["English", {
                "windows": [{
                    "manualUrl": "/downloads/example/en1installer0",
                    "name": "setup_example.exe",
                    "version": version,
                    "size": "1 GB"
                }],
                "mac": [],
                "linux": []
            }],
            ["Deutsch", {
                "windows": [{
                    "manualUrl": "/downloads/example/de1installer0",
                    "name": "setup_example_de.exe",
                    "version": version,
                    "size": "1 GB"
                }]
            }]
        ],
        "extras": [{"manualUrl": "/downloads/example/extra1", "name": "Manual", "type": "manuals", "size": "2 MB"}],
        "dlcs": []
    })
    .to_string()
}

/// How the mock auth service answers
#[derive(Clone, Debug)]
pub(crate) enum AuthBehavior {
    Token,
    Fail(String),
    /// Never answers
    Hang,
}

pub(crate) struct MockAuth {
    behavior: Mutex<AuthBehavior>,
    pub(crate) calls: AtomicUsize,
}

impl MockAuth {
    pub(crate) fn new(behavior: AuthBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set(&self, behavior: AuthBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait::async_trait]
impl AuthService for MockAuth {
    async fn refresh_token(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            AuthBehavior::Token => Ok(TEST_TOKEN.to_string()),
            AuthBehavior::Fail(reason) => Err(Error::Auth(reason)),
            AuthBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Catalogue backed by a map; unknown ids are a metadata error
#[derive(Default)]
pub(crate) struct MockMetadata {
    records: Mutex<HashMap<GameId, GameRecord>>,
}

impl MockMetadata {
    pub(crate) fn insert(&self, id: GameId, title: &str, raw_metadata: String) {
        self.records.lock().unwrap().insert(
            id,
            GameRecord {
                id,
                title: title.to_string(),
                raw_metadata,
            },
        );
    }
}

#[async_trait::async_trait]
impl MetadataStore for MockMetadata {
    async fn get_by_id(&self, id: GameId) -> Result<GameRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("game {} not found", id)))
    }
}

/// What the mock transfer engine does for one game
#[derive(Clone, Debug)]
pub(crate) enum TransferBehavior {
    /// Create these files in the target directory, report progress, succeed
    Succeed(Vec<String>),
    /// Report some progress, then fail
    Fail(String),
    /// Report some progress, then wait for cancellation
    WaitForCancel,
    Panic,
}

pub(crate) struct MockTransfer {
    behaviors: Mutex<HashMap<GameId, TransferBehavior>>,
    pub(crate) jobs: Mutex<Vec<TransferJob>>,
}

impl MockTransfer {
    pub(crate) fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn on(&self, id: GameId, behavior: TransferBehavior) {
        self.behaviors.lock().unwrap().insert(id, behavior);
    }

    pub(crate) fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

fn emit_progress(sink: &Arc<dyn ProgressSink>, files: &[(String, u64)]) {
    let total: u64 = files.iter().map(|(_, size)| size).sum();
    let mut stream = ProgressEvent::Start {
        overall_total_bytes: total,
    }
    .to_line();
    for (name, size) in files {
        stream.extend(
            ProgressEvent::FileProgress {
                file_name: name.clone(),
                current_bytes: size / 2,
                total_bytes: *size,
            }
            .to_line(),
        );
        stream.extend(
            ProgressEvent::FileProgress {
                file_name: name.clone(),
                current_bytes: *size,
                total_bytes: *size,
            }
            .to_line(),
        );
    }
    // Deliver in odd-sized chunks
    for chunk in stream.chunks(7) {
        sink.write_progress(chunk);
    }
}

#[async_trait::async_trait]
impl TransferEngine for MockTransfer {
    async fn download_files(&self, job: TransferJob, progress: Arc<dyn ProgressSink>) -> Result<()> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&job.game_id)
            .cloned()
            .unwrap_or(TransferBehavior::Succeed(Vec::new()));
        let game_id = job.game_id;
        let cancel = job.cancel.clone();
        let target = job.target_path.clone();
        self.jobs.lock().unwrap().push(job);

        match behavior {
            TransferBehavior::Succeed(files) => {
                let mut sized = Vec::new();
                for name in files {
                    let path = target.join(&name);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, b"installer").await?;
                    sized.push((name, 1024));
                }
                if sized.is_empty() {
                    sized.push(("setup_example.exe".to_string(), 4096));
                }
                emit_progress(&progress, &sized);
                Ok(())
            }
            TransferBehavior::Fail(reason) => {
                emit_progress(&progress, &[("setup_example.exe".to_string(), 4096)]);
                Err(Error::Transfer(reason))
            }
            TransferBehavior::WaitForCancel => {
                progress.write_progress(
                    &ProgressEvent::FileProgress {
                        file_name: "setup_example.exe".to_string(),
                        current_bytes: 1,
                        total_bytes: 4096,
                    }
                    .to_line(),
                );
                cancel.cancelled().await;
                Err(DownloadError::Cancelled {
                    game_id: game_id.0,
                }
                .into())
            }
            TransferBehavior::Panic => panic!("transfer engine exploded"),
        }
    }
}

/// Collaborators of a test manager, kept for scripting and inspection
#[derive(Clone)]
pub(crate) struct TestServices {
    pub(crate) auth: Arc<MockAuth>,
    pub(crate) metadata: Arc<MockMetadata>,
    pub(crate) transfer: Arc<MockTransfer>,
}

impl TestServices {
    pub(crate) fn new() -> Self {
        Self {
            auth: Arc::new(MockAuth::new(AuthBehavior::Token)),
            metadata: Arc::new(MockMetadata::default()),
            transfer: Arc::new(MockTransfer::new()),
        }
    }

    pub(crate) fn services(&self) -> Services {
        Services::new(
            self.auth.clone(),
            self.metadata.clone(),
            self.transfer.clone(),
        )
    }

    /// Register a game whose installer is at version 1.0
    pub(crate) fn add_game(&self, id: i64, title: &str) -> GameId {
        let id = GameId(id);
        self.metadata
            .insert(id, title, sample_metadata(title, "1.0"));
        id
    }
}

/// Config rooted in `dir` with a JSON history
pub(crate) fn test_config(dir: &std::path::Path, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.join("games");
    config.download.max_concurrent_downloads = max_concurrent;
    config.persistence.history_path = dir.join("download_history.json");
    config.persistence.database_path = dir.join("gog-dl.db");
    config
}

/// Helper to create a test DownloadManager with its own scratch directory.
/// Returns the manager, its mock collaborators and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager(
    max_concurrent: usize,
) -> (DownloadManager, TestServices, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let services = TestServices::new();
    let manager = DownloadManager::new(
        test_config(temp_dir.path(), max_concurrent),
        services.services(),
    )
    .await
    .unwrap();
    (manager, services, temp_dir)
}

/// Poll until the latest task for `game_id` satisfies `done`
pub(crate) async fn wait_for<F>(manager: &DownloadManager, game_id: GameId, done: F) -> TaskView
where
    F: Fn(&TaskView) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(view) = manager.task(game_id) {
            if done(&view) {
                return view;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "timed out waiting for game {}: {:?}",
                game_id,
                manager.task(game_id)
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the latest task for `game_id` is in `state`
pub(crate) async fn wait_for_state(
    manager: &DownloadManager,
    game_id: GameId,
    state: TaskState,
) -> TaskView {
    wait_for(manager, game_id, |view| view.state == state).await
}

/// Wait until the latest task for `game_id` is terminal and its slot is free
pub(crate) async fn wait_for_terminal(manager: &DownloadManager, game_id: GameId) -> TaskView {
    let view = wait_for(manager, game_id, |view| view.state.is_terminal()).await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while manager.is_active(game_id) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "slot for game {} never released",
            game_id
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    view
}
