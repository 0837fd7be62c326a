//! Collaborators the download manager depends on
//!
//! Token acquisition, metadata lookup and the byte transfer itself live
//! outside this crate. The manager only talks to them through these traits,
//! which keeps every lifecycle path testable with in-memory fakes.

use crate::error::Result;
use crate::metadata::{GameMetadata, GameRecord};
use crate::progress::ProgressSink;
use crate::types::{DownloadFlags, GameId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Provides fresh store access tokens
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Return a valid access token, refreshing it if needed
    async fn refresh_token(&self) -> Result<String>;
}

/// Looks up game records in the local catalogue
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch the catalogue record for a game
    async fn get_by_id(&self, id: GameId) -> Result<GameRecord>;

    /// Parse the raw installer metadata stored with a record
    fn parse_installer_metadata(&self, raw: &str) -> Result<GameMetadata> {
        GameMetadata::from_json(raw)
    }
}

/// Everything the transfer engine needs for one download
#[derive(Clone, Debug)]
pub struct TransferJob {
    /// Game being downloaded
    pub game_id: GameId,
    /// Cancelled when the user cancels the download
    pub cancel: CancellationToken,
    /// Access token obtained for this attempt
    pub access_token: String,
    /// Parsed installer metadata
    pub metadata: GameMetadata,
    /// Directory the files are written into
    pub target_path: PathBuf,
    /// Store language name (e.g. "English")
    pub language: String,
    /// "all", "windows", "mac" or "linux"
    pub platform: String,
    /// Inclusion and layout flags
    pub flags: DownloadFlags,
    /// Parallel file workers
    pub threads: usize,
}

/// Fetches installer files to disk
///
/// Implementations stream JSON progress events into `progress` (possibly
/// from several worker threads), and must return promptly once
/// `job.cancel` is cancelled. Partially written files are left in place so
/// a later attempt can resume them.
#[async_trait::async_trait]
pub trait TransferEngine: Send + Sync {
    /// Download every selected file of `job`
    async fn download_files(&self, job: TransferJob, progress: Arc<dyn ProgressSink>)
    -> Result<()>;
}

/// The set of collaborators handed to [`crate::DownloadManager`]
#[derive(Clone)]
pub struct Services {
    /// Token provider
    pub auth: Arc<dyn AuthService>,
    /// Catalogue lookup
    pub metadata: Arc<dyn MetadataStore>,
    /// File transfer
    pub transfer: Arc<dyn TransferEngine>,
}

impl Services {
    /// Bundle the three collaborators
    pub fn new(
        auth: Arc<dyn AuthService>,
        metadata: Arc<dyn MetadataStore>,
        transfer: Arc<dyn TransferEngine>,
    ) -> Self {
        Self {
            auth,
            metadata,
            transfer,
        }
    }
}
