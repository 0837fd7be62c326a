//! Download snapshots and update detection.
//!
//! A completed download leaves two files in its target directory:
//! - `download_info.json` - the settings the download used
//! - `metadata.json` - the installer metadata as it was at download time
//!
//! Comparing the version map built from that snapshot with one built from
//! the current catalogue record tells whether the game has new or changed
//! installers.

use crate::error::{Error, Result};
use crate::metadata::GameMetadata;
use crate::types::{DownloadFlags, DownloadRequest, GameId};
use crate::version::{build_version_map, diff};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::DownloadManager;

/// Settings file written next to the downloaded installers
pub const DOWNLOAD_INFO_FILE: &str = "download_info.json";
/// Installer metadata snapshot written next to the downloaded installers
pub const METADATA_FILE: &str = "metadata.json";

/// Settings a completed download used
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// Language as requested ("en" or "English")
    pub language: String,
    /// Platform selection
    pub platform: String,
    /// Inclusion and layout flags
    pub flags: DownloadFlags,
    /// Parallel file workers
    pub threads: usize,
    /// When the download completed
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadInfo {
    fn from_request(request: &DownloadRequest) -> Self {
        Self {
            language: request.language.clone(),
            platform: request.platform.clone(),
            flags: request.flags,
            threads: request.threads,
            downloaded_at: Utc::now(),
        }
    }
}

/// Write `download_info.json` and `metadata.json` into `dir`
pub(crate) async fn write_snapshots(
    dir: &Path,
    request: &DownloadRequest,
    raw_metadata: &str,
) -> Result<()> {
    let info = serde_json::to_vec_pretty(&DownloadInfo::from_request(request))?;
    tokio::fs::write(dir.join(DOWNLOAD_INFO_FILE), info).await?;
    tokio::fs::write(dir.join(METADATA_FILE), raw_metadata).await?;
    Ok(())
}

async fn read_snapshot(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read '{}': {}", path.display(), e),
        ))
    })
}

impl DownloadManager {
    /// Compare a previous download in `dir` against the current catalogue
    ///
    /// Returns one line per new or changed installer, `NEW: <key> version=<v>`
    /// or `CHANGED: <key> <old> -> <new>`. An empty list means the download is
    /// up to date.
    ///
    /// # Errors
    ///
    /// Fails if `dir` holds no snapshot from a completed download, or if the
    /// current record cannot be fetched or parsed.
    pub async fn check_for_updates(&self, game_id: GameId, dir: &Path) -> Result<Vec<String>> {
        let info: DownloadInfo =
            serde_json::from_str(&read_snapshot(&dir.join(DOWNLOAD_INFO_FILE)).await?)?;
        let previous = self
            .services
            .metadata
            .parse_installer_metadata(&read_snapshot(&dir.join(METADATA_FILE)).await?)?;

        let record = self.services.metadata.get_by_id(game_id).await?;
        let current = self
            .services
            .metadata
            .parse_installer_metadata(&record.raw_metadata)?;

        let build = |metadata: &GameMetadata| {
            build_version_map(
                metadata,
                &info.language,
                &info.platform,
                info.flags.extras,
                info.flags.dlc,
                !info.flags.skip_patches,
            )
        };
        let changes = diff(&build(&previous), &build(&current));

        tracing::info!(
            game_id = game_id.0,
            changes = changes.len(),
            "checked installed version against catalogue"
        );
        Ok(changes)
    }
}
