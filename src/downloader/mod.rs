//! Download manager split into focused submodules.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`gate`] - Per-game slots, global concurrency cap and FIFO queue
//! - [`task`] - The per-attempt state machine
//! - [`control`] - Starting, cancelling, listing and clearing downloads
//! - [`attempt`] - Running one attempt and finalizing it exactly once
//! - [`lifecycle`] - Startup (history restore) and shutdown coordination
//! - [`updates`] - Download snapshots and update detection

mod attempt;
mod control;
mod gate;
mod lifecycle;
mod task;
mod updates;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use gate::{ConcurrencyGate, GateDecision};
pub use updates::{DOWNLOAD_INFO_FILE, DownloadInfo, METADATA_FILE};

use crate::config::Config;
use crate::error::Result;
use crate::history::{HistoryStore, PersistentTaskRecord};
use crate::pruner::Pruner;
use crate::services::Services;
use crate::types::{Event, GameId};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use task::Task;

/// Main download manager (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadManager {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Auth, metadata and transfer collaborators
    pub(crate) services: Services,
    /// Active set and FIFO queue
    pub(crate) gate: Arc<ConcurrencyGate>,
    /// Every task since startup plus those restored from history, oldest first
    pub(crate) registry: Arc<RwLock<Vec<Arc<Task>>>>,
    /// Terminal-task history backend
    pub(crate) history: Arc<dyn HistoryStore>,
    /// Serializes history rewrites so an older snapshot never lands last
    pub(crate) history_lock: Arc<tokio::sync::Mutex<()>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Removes superseded installers after a completed download
    pub(crate) pruner: Pruner,
    /// Flag to indicate whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl DownloadManager {
    fn registry_read(&self) -> RwLockReadGuard<'_, Vec<Arc<Task>>> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry_write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Task>>> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Most recent attempt for `game_id`
    pub(crate) fn latest_task(&self, game_id: GameId) -> Option<Arc<Task>> {
        self.registry_read()
            .iter()
            .rev()
            .find(|task| task.game_id() == game_id)
            .cloned()
    }

    /// Attempts that have not reached a terminal state
    pub(crate) fn running_tasks(&self) -> Vec<Arc<Task>> {
        self.registry_read()
            .iter()
            .filter(|task| !task.is_terminal())
            .cloned()
            .collect()
    }

    pub(crate) fn register(&self, task: Arc<Task>) {
        self.registry_write().push(task);
    }

    fn history_records(&self) -> Vec<PersistentTaskRecord> {
        self.registry_read()
            .iter()
            .filter_map(|task| task.to_record())
            .collect()
    }

    /// Rewrite the history with every terminal task in the registry
    pub(crate) async fn persist_history(&self) -> Result<()> {
        let _guard = self.history_lock.lock().await;
        // Snapshot under the lock so writes land in snapshot order
        let records = self.history_records();
        self.history.save_all(&records).await?;
        tracing::debug!(count = records.len(), "download history persisted");
        Ok(())
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
