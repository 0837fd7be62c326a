//! Download history persistence
//!
//! Only terminal tasks are persisted. The whole history is rewritten on every
//! change; there is no append-only log. Two backends implement
//! [`HistoryStore`]:
//! - [`JsonHistoryStore`] - a single JSON array file (default)
//! - [`SqliteHistoryStore`] - a `task_history` table in a SQLite database

mod json;
mod sqlite;

pub use json::JsonHistoryStore;
pub use sqlite::SqliteHistoryStore;

use crate::error::Result;
use crate::types::{GameId, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Serializable projection of a terminal task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentTaskRecord {
    /// Game id
    pub id: GameId,
    /// Terminal state
    pub state: TaskState,
    /// Display title
    pub title: String,
    /// Final status line
    pub status_text: String,
    /// Target directory of the attempt
    pub download_path: PathBuf,
    /// When the attempt was created
    pub timestamp: DateTime<Utc>,
}

/// Storage for the terminal-task history
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load all records in their stored order
    ///
    /// A store that has never been written returns an empty list.
    async fn load(&self) -> Result<Vec<PersistentTaskRecord>>;

    /// Replace the stored history with `records`
    async fn save_all(&self, records: &[PersistentTaskRecord]) -> Result<()>;
}
