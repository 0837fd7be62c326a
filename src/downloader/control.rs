//! Download control operations (start, cancel, inspect, clear).

use crate::error::{DownloadError, Error, Result};
use crate::types::{Admission, DownloadRequest, Event, GameId, TaskView};
use crate::utils::game_directory;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::task::Task;
use super::{DownloadManager, GateDecision};

const PLATFORMS: &[&str] = &["all", "windows", "mac", "linux"];

impl DownloadManager {
    /// Build a request using the configured download directory, thread count
    /// and prune setting
    pub fn new_request(&self, game_id: GameId, title: impl Into<String>) -> DownloadRequest {
        let mut request = DownloadRequest::new(
            game_id,
            title,
            self.config.download.download_dir.clone(),
        );
        request.threads = self.config.download.default_threads;
        request.prune_old_versions = self.config.download.prune_after_download;
        request
    }

    /// Start downloading a game, or queue it when every slot is busy
    ///
    /// Returns as soon as the request is admitted; the outcome of the
    /// download is observed through [`list_tasks`](Self::list_tasks) and
    /// [`subscribe`](Self::subscribe).
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a bad thread count, empty path or title,
    ///   or unknown platform. No task is created.
    /// - [`DownloadError::InProgress`] when the game is already active or
    ///   queued. No task is created.
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn start_download(&self, request: DownloadRequest) -> Result<Admission> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.validate_request(&request)?;

        let game_id = request.game_id;
        let title = request.title.clone();
        match self.gate.admit(request.clone())? {
            GateDecision::Admitted => {
                let task = self.start_admitted(request);
                Ok(Admission::Started {
                    instance_id: task.instance_id(),
                })
            }
            GateDecision::Queued { position } => {
                tracing::info!(game_id = game_id.0, position, "download queued");
                self.emit(Event::Queued {
                    game_id,
                    title,
                    position,
                });
                Ok(Admission::Queued { position })
            }
        }
    }

    fn validate_request(&self, request: &DownloadRequest) -> Result<()> {
        let limits = &self.config.download;
        if request.threads < limits.min_threads || request.threads > limits.max_threads {
            return Err(Error::validation(
                "threads",
                format!(
                    "must be between {} and {}, got {}",
                    limits.min_threads, limits.max_threads, request.threads
                ),
            ));
        }
        if request.download_path.as_os_str().is_empty() {
            return Err(Error::validation("download_path", "must not be empty"));
        }
        if request.title.trim().is_empty() {
            return Err(Error::validation("title", "must not be empty"));
        }
        if request.language.trim().is_empty() {
            return Err(Error::validation("language", "must not be empty"));
        }
        if !PLATFORMS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&request.platform))
        {
            return Err(Error::validation(
                "platform",
                format!("must be one of {}", PLATFORMS.join(", ")),
            ));
        }
        Ok(())
    }

    /// Create and run a task for a request that already holds its slot
    pub(crate) fn start_admitted(&self, request: DownloadRequest) -> Arc<Task> {
        let target = game_directory(&request.download_path, &request.title);
        let task = Arc::new(Task::new(
            request.game_id,
            request.title.clone(),
            target,
            self.event_tx.clone(),
        ));
        self.register(Arc::clone(&task));

        tracing::info!(
            game_id = task.game_id().0,
            instance_id = task.instance_id(),
            path = %task.download_path().display(),
            "download admitted"
        );
        self.emit(Event::Started {
            game_id: task.game_id(),
            instance_id: task.instance_id(),
            title: task.title().to_string(),
        });

        self.spawn_attempt(Arc::clone(&task), request);
        task
    }

    /// Cancel an active or queued download
    ///
    /// A queued request is removed without ever creating a task. An active
    /// download is signalled and ends in the `Cancelled` state once the
    /// transfer engine has stopped; files already on disk are kept.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::NotFound`] if the game was never started
    /// - [`DownloadError::InvalidState`] if its latest attempt already finished
    pub fn cancel(&self, game_id: GameId) -> Result<()> {
        if self.gate.cancel_queued(game_id).is_some() {
            tracing::info!(game_id = game_id.0, "queued download removed");
            self.emit(Event::Removed { game_id });
            return Ok(());
        }

        match self.latest_task(game_id) {
            Some(task) if !task.is_terminal() => {
                tracing::info!(
                    game_id = game_id.0,
                    instance_id = task.instance_id(),
                    "cancelling download"
                );
                task.cancel();
                Ok(())
            }
            Some(task) => Err(DownloadError::InvalidState {
                game_id: game_id.0,
                operation: "cancel".to_string(),
                current_state: task.state().to_string(),
            }
            .into()),
            None => Err(DownloadError::NotFound { game_id: game_id.0 }.into()),
        }
    }

    /// Views of every task in the registry, oldest first
    pub fn list_tasks(&self) -> Vec<TaskView> {
        self.registry_read().iter().map(|task| task.view()).collect()
    }

    /// View of the latest attempt for `game_id`
    pub fn task(&self, game_id: GameId) -> Option<TaskView> {
        self.latest_task(game_id).map(|task| task.view())
    }

    /// Game ids waiting for a slot, oldest first
    pub fn queued(&self) -> Vec<GameId> {
        self.gate.queued()
    }

    /// Whether `game_id` currently holds a download slot
    pub fn is_active(&self, game_id: GameId) -> bool {
        self.gate.is_active(game_id)
    }

    /// Subscribe to lifecycle events
    ///
    /// Slow subscribers may miss events (see
    /// [`tokio::sync::broadcast`]); [`list_tasks`](Self::list_tasks) always
    /// reflects the current state.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Remove every finished task from the registry and rewrite the history
    ///
    /// Returns how many tasks were removed.
    pub async fn clear_finished(&self) -> Result<usize> {
        let removed = {
            let mut registry = self.registry_write();
            let before = registry.len();
            registry.retain(|task| !task.is_terminal());
            before - registry.len()
        };

        self.persist_history().await?;

        tracing::info!(removed, "cleared finished downloads");
        self.emit(Event::HistoryCleared { removed });
        Ok(removed)
    }
}
