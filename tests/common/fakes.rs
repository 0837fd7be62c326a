//! In-memory collaborators built only on the public API

use gog_dl::{
    AuthService, Error, GameId, GameRecord, MetadataStore, ProgressEvent, ProgressSink, Result,
    Services, TransferEngine, TransferJob,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Store JSON for a game with one Windows and one Linux installer
pub fn installer_metadata(title: &str, version: &str) -> String {
    serde_json::json!({
        "title": title,
        "downloads": [
            ["English", {
                "windows": [{
                    "manualUrl": "/downloads/game/en1installer0",
                    "name": format!("setup_game_{}.exe", version),
                    "version": version,
                    "size": "800 MB"
                }],
                "linux": [{
                    "manualUrl": "/downloads/game/en3installer0",
                    "name": format!("game_{}.sh", version.replace('.', "_")),
                    "version": version,
                    "size": "780 MB"
                }]
            }]
        ]
    })
    .to_string()
}

/// Catalogue, token source and transfer engine in one
///
/// The transfer writes each selected installer into the target directory
/// (one byte per installer), reporting progress as it goes. Games listed in
/// `hold` stay in the transfer until cancelled.
#[derive(Clone, Default)]
pub struct FakeCatalogue {
    records: Arc<Mutex<HashMap<GameId, GameRecord>>>,
    hold: Arc<Mutex<HashSet<GameId>>>,
}

impl FakeCatalogue {
    /// Add or replace a game at `version`
    pub fn publish(&self, id: i64, title: &str, version: &str) -> GameId {
        let id = GameId(id);
        self.records.lock().unwrap().insert(
            id,
            GameRecord {
                id,
                title: title.to_string(),
                raw_metadata: installer_metadata(title, version),
            },
        );
        id
    }

    /// Keep transfers of `id` running until they are cancelled
    pub fn hold(&self, id: GameId) {
        self.hold.lock().unwrap().insert(id);
    }

    /// Collaborators for a manager
    pub fn services(&self) -> Services {
        let this = Arc::new(self.clone());
        Services::new(this.clone(), this.clone(), this)
    }
}

#[async_trait::async_trait]
impl AuthService for FakeCatalogue {
    async fn refresh_token(&self) -> Result<String> {
        Ok("integration-token".to_string())
    }
}

#[async_trait::async_trait]
impl MetadataStore for FakeCatalogue {
    async fn get_by_id(&self, id: GameId) -> Result<GameRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("unknown game {}", id)))
    }
}

#[async_trait::async_trait]
impl TransferEngine for FakeCatalogue {
    async fn download_files(&self, job: TransferJob, progress: Arc<dyn ProgressSink>) -> Result<()> {
        let files: Vec<String> = job
            .metadata
            .downloads
            .iter()
            .filter(|downloads| downloads.language().eq_ignore_ascii_case(&job.language))
            .flat_map(|downloads| downloads.platforms().iter())
            .filter(|(platform, _)| job.platform == "all" || *platform == job.platform)
            .flat_map(|(_, files)| files.iter().map(|f| f.name.clone()))
            .collect();

        progress.write_progress(
            &ProgressEvent::Start {
                overall_total_bytes: files.len() as u64,
            }
            .to_line(),
        );
        for name in &files {
            tokio::fs::write(job.target_path.join(name), b"x").await?;
            progress.write_progress(
                &ProgressEvent::FileProgress {
                    file_name: name.clone(),
                    current_bytes: 1,
                    total_bytes: 1,
                }
                .to_line(),
            );
        }

        let held = self.hold.lock().unwrap().contains(&job.game_id);
        if held {
            job.cancel.cancelled().await;
            return Err(gog_dl::DownloadError::Cancelled {
                game_id: job.game_id.0,
            }
            .into());
        }
        Ok(())
    }
}
