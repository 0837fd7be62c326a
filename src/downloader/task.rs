//! One download attempt and its state machine.

use crate::history::PersistentTaskRecord;
use crate::progress::ProgressTarget;
use crate::types::{Event, GameId, TaskState, TaskView};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub(crate) const STATUS_PREPARING: &str = "Preparing download...";
pub(crate) const STATUS_DOWNLOADING: &str = "Downloading...";
pub(crate) const STATUS_CANCELLED: &str = "Download cancelled";

/// Fields that change while the attempt runs
struct TaskFields {
    state: TaskState,
    status_text: String,
    details_text: String,
    progress: f64,
    file_status_text: String,
}

/// A single download attempt
///
/// Mutated only by its own attempt (through [`ProgressTarget`] and the
/// finishing transitions). Once terminal, every mutator is a no-op.
pub(crate) struct Task {
    game_id: GameId,
    instance_id: i64,
    title: String,
    download_path: PathBuf,
    created_at: DateTime<Utc>,
    cancel: CancellationToken,
    fields: RwLock<TaskFields>,
    event_tx: broadcast::Sender<Event>,
}

impl Task {
    /// Create a task in `Preparing`
    pub(crate) fn new(
        game_id: GameId,
        title: String,
        download_path: PathBuf,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            game_id,
            instance_id: instance_id_for(&created_at),
            title,
            download_path,
            created_at,
            cancel: CancellationToken::new(),
            fields: RwLock::new(TaskFields {
                state: TaskState::Preparing,
                status_text: STATUS_PREPARING.to_string(),
                details_text: String::new(),
                progress: 0.0,
                file_status_text: String::new(),
            }),
            event_tx,
        }
    }

    /// Rebuild a terminal task from history
    ///
    /// Live fields are reset: the cancellation token is inert and the
    /// progress is 1.0 only for completed downloads.
    pub(crate) fn from_record(
        record: PersistentTaskRecord,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let progress = if record.state == TaskState::Completed {
            1.0
        } else {
            0.0
        };
        Self {
            game_id: record.id,
            instance_id: instance_id_for(&record.timestamp),
            title: record.title,
            download_path: record.download_path,
            created_at: record.timestamp,
            cancel: CancellationToken::new(),
            fields: RwLock::new(TaskFields {
                state: record.state,
                status_text: record.status_text,
                details_text: String::new(),
                progress,
                file_status_text: String::new(),
            }),
            event_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TaskFields> {
        self.fields.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TaskFields> {
        self.fields.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn game_id(&self) -> GameId {
        self.game_id
    }

    pub(crate) fn instance_id(&self) -> i64 {
        self.instance_id
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn download_path(&self) -> &Path {
        &self.download_path
    }

    pub(crate) fn state(&self) -> TaskState {
        self.read().state
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask the running attempt to stop
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Enter `Completed`; returns false if the task was already terminal
    pub(crate) fn mark_completed(&self) -> bool {
        let status = format!("Download completed: {}", self.download_path.display());
        let changed = self.finish(TaskState::Completed, status, true);
        if changed {
            self.emit(Event::Completed {
                game_id: self.game_id,
                instance_id: self.instance_id,
                path: self.download_path.clone(),
            });
        }
        changed
    }

    /// Enter `Cancelled`; returns false if the task was already terminal
    pub(crate) fn mark_cancelled(&self) -> bool {
        let changed = self.finish(TaskState::Cancelled, STATUS_CANCELLED.to_string(), false);
        if changed {
            self.emit(Event::Cancelled {
                game_id: self.game_id,
                instance_id: self.instance_id,
            });
        }
        changed
    }

    /// Enter `Error`; returns false if the task was already terminal
    pub(crate) fn mark_failed(&self, error: &str) -> bool {
        let status = format!("Download failed: {}", error);
        let changed = self.finish(TaskState::Error, status, false);
        if changed {
            self.emit(Event::Failed {
                game_id: self.game_id,
                instance_id: self.instance_id,
                error: error.to_string(),
            });
        }
        changed
    }

    fn finish(&self, state: TaskState, status_text: String, complete: bool) -> bool {
        let mut fields = self.write();
        if fields.state.is_terminal() {
            return false;
        }
        fields.state = state;
        fields.status_text = status_text;
        fields.details_text.clear();
        fields.file_status_text.clear();
        if complete {
            fields.progress = 1.0;
        }
        true
    }

    /// Presentation snapshot
    pub(crate) fn view(&self) -> TaskView {
        let fields = self.read();
        TaskView {
            game_id: self.game_id,
            instance_id: self.instance_id,
            title: self.title.clone(),
            state: fields.state,
            status_text: fields.status_text.clone(),
            details_text: fields.details_text.clone(),
            progress: fields.progress,
            file_status_text: fields.file_status_text.clone(),
            download_path: self.download_path.clone(),
            created_at: self.created_at,
        }
    }

    /// History projection; `None` while the attempt is still running
    pub(crate) fn to_record(&self) -> Option<PersistentTaskRecord> {
        let fields = self.read();
        if !fields.state.is_terminal() {
            return None;
        }
        Some(PersistentTaskRecord {
            id: self.game_id,
            state: fields.state,
            title: self.title.clone(),
            status_text: fields.status_text.clone(),
            download_path: self.download_path.clone(),
            timestamp: self.created_at,
        })
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

impl ProgressTarget for Task {
    fn begin_downloading(&self) {
        {
            let mut fields = self.write();
            if fields.state != TaskState::Preparing {
                return;
            }
            fields.state = TaskState::Downloading;
            fields.status_text = STATUS_DOWNLOADING.to_string();
        }
        tracing::info!(game_id = self.game_id.0, "download started receiving data");
        self.emit(Event::Downloading {
            game_id: self.game_id,
            instance_id: self.instance_id,
        });
    }

    fn publish_progress(&self, progress: f64) {
        let mut fields = self.write();
        if fields.state == TaskState::Downloading && progress > fields.progress {
            fields.progress = progress.clamp(0.0, 1.0);
        }
    }

    fn publish_details(&self, details: String) {
        let progress = {
            let mut fields = self.write();
            if fields.state.is_terminal() {
                return;
            }
            fields.details_text = details.clone();
            fields.progress
        };
        self.emit(Event::Progress {
            game_id: self.game_id,
            instance_id: self.instance_id,
            progress,
            details,
        });
    }

    fn publish_file_status(&self, text: String) {
        let mut fields = self.write();
        if !fields.state.is_terminal() {
            fields.file_status_text = text;
        }
    }
}

/// Creation time in Unix nanoseconds
fn instance_id_for(created_at: &DateTime<Utc>) -> i64 {
    created_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| created_at.timestamp_micros().saturating_mul(1000))
}
