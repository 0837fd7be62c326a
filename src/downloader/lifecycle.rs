//! Startup and shutdown coordination.

use crate::config::{Config, HistoryBackend};
use crate::error::Result;
use crate::history::{HistoryStore, JsonHistoryStore, SqliteHistoryStore};
use crate::pruner::{Pruner, VersionExtractor};
use crate::services::Services;
use crate::types::Event;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::task::Task;
use super::{ConcurrencyGate, DownloadManager};

/// How long `shutdown` waits for cancelled downloads to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl DownloadManager {
    /// Create a new DownloadManager instance
    ///
    /// Validates the configuration, opens the configured history backend and
    /// restores the terminal tasks it contains.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the history
    /// cannot be opened or decoded.
    pub async fn new(config: Config, services: Services) -> Result<Self> {
        config.validate()?;

        let history: Arc<dyn HistoryStore> = match config.persistence.history_backend {
            HistoryBackend::Json => Arc::new(JsonHistoryStore::new(
                config.persistence.history_path.clone(),
            )),
            HistoryBackend::Sqlite => {
                Arc::new(SqliteHistoryStore::open(&config.persistence.database_path).await?)
            }
        };

        Self::with_history_store(config, services, history).await
    }

    /// Create a DownloadManager persisting its history into `history`
    pub async fn with_history_store(
        config: Config,
        services: Services,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let manager = Self {
            gate: Arc::new(ConcurrencyGate::new(
                config.download.max_concurrent_downloads,
            )),
            config: Arc::new(config),
            services,
            registry: Arc::new(RwLock::new(Vec::new())),
            history,
            history_lock: Arc::new(tokio::sync::Mutex::new(())),
            event_tx,
            pruner: Pruner::default(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        manager.restore_history().await?;
        Ok(manager)
    }

    /// Use a custom version extraction policy when pruning
    pub fn with_version_extractor(mut self, extractor: Arc<dyn VersionExtractor>) -> Self {
        self.pruner = Pruner::new(extractor);
        self
    }

    /// Load terminal tasks from history into the registry
    async fn restore_history(&self) -> Result<usize> {
        let records = self.history.load().await?;

        let mut restored = Vec::with_capacity(records.len());
        for record in records {
            if !record.state.is_terminal() {
                tracing::warn!(
                    game_id = record.id.0,
                    state = %record.state,
                    "skipping non-terminal history record"
                );
                continue;
            }
            restored.push(Arc::new(Task::from_record(record, self.event_tx.clone())));
        }

        let count = restored.len();
        self.registry_write().extend(restored);

        if count > 0 {
            tracing::info!(count, "Restored download history");
        } else {
            tracing::debug!("No download history to restore");
        }
        Ok(count)
    }

    /// Gracefully shut down the manager
    ///
    /// 1. Stops accepting new downloads
    /// 2. Drops every queued request
    /// 3. Cancels all active downloads
    /// 4. Waits for them to finalize (30 second timeout)
    /// 5. Persists the history one last time
    ///
    /// Partially downloaded files stay on disk so a later attempt can resume.
    ///
    /// # Errors
    ///
    /// Returns an error if the final history write fails.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);

        for request in self.gate.drain_queue() {
            tracing::debug!(game_id = request.game_id.0, "dropping queued download");
            self.emit(Event::Removed {
                game_id: request.game_id,
            });
        }

        let running = self.running_tasks();
        tracing::debug!(active_count = running.len(), "Cancelling active downloads");
        for task in &running {
            task.cancel();
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_downloads()).await {
            Ok(()) => tracing::info!("All active downloads finalized"),
            Err(_) => tracing::warn!(
                active_count = self.gate.active_count(),
                "Timeout waiting for downloads to finalize, proceeding with shutdown"
            ),
        }

        self.persist_history().await?;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_downloads(&self) {
        loop {
            let active_count = self.gate.active_count();
            if active_count == 0 {
                return;
            }
            // Catch attempts started by a finalize that raced the queue drain
            for task in self.running_tasks() {
                task.cancel();
            }
            tracing::debug!(active_count, "Waiting for active downloads to finalize");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Whether `start_download` still accepts requests
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
