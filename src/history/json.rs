//! JSON file history backend.

use super::{HistoryStore, PersistentTaskRecord};
use crate::error::{HistoryError, Result};
use std::path::{Path, PathBuf};

/// History kept as one pretty-printed JSON array
///
/// Writes go to a sibling temporary file that is then renamed over the
/// history file, so a crash mid-write never leaves a truncated history.
#[derive(Clone, Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    /// Use the history file at `path` (created on first save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_failed(&self, reason: impl ToString) -> HistoryError {
        HistoryError::ReadFailed {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_failed(&self, reason: impl ToString) -> HistoryError {
        HistoryError::WriteFailed {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn load(&self) -> Result<Vec<PersistentTaskRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no history file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.read_failed(e).into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let records: Vec<PersistentTaskRecord> =
            serde_json::from_slice(&bytes).map_err(|e| self.read_failed(e))?;
        tracing::debug!(
            path = %self.path.display(),
            count = records.len(),
            "loaded download history"
        );
        Ok(records)
    }

    async fn save_all(&self, records: &[PersistentTaskRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_failed(e))?;
        }

        let json = serde_json::to_vec_pretty(records).map_err(|e| self.write_failed(e))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| self.write_failed(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.write_failed(e))?;

        tracing::debug!(
            path = %self.path.display(),
            count = records.len(),
            "saved download history"
        );
        Ok(())
    }
}
