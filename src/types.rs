//! Core types for gog-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Store identifier of a game
///
/// Not unique across history: the same game may be downloaded many times,
/// each attempt being a separate task distinguished by its instance id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub i64);

impl GameId {
    /// Create a new GameId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for GameId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<GameId> for i64 {
    fn from(id: GameId) -> Self {
        id.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GameId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle state of a download task
///
/// `Preparing → Downloading → {Completed, Cancelled, Error}`. The last three
/// are terminal: once reached, a task never changes state again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Admitted, waiting for a token and metadata
    Preparing,
    /// Receiving file progress from the transfer engine
    Downloading,
    /// Transfer finished without error
    Completed,
    /// Stopped by the user
    Cancelled,
    /// Failed (auth, metadata or transfer)
    Error,
}

impl TaskState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Error
        )
    }

    /// Convert TaskState to integer code for database storage
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskState::Preparing => 0,
            TaskState::Downloading => 1,
            TaskState::Completed => 2,
            TaskState::Cancelled => 3,
            TaskState::Error => 4,
        }
    }

    /// Convert integer code from the database to TaskState
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => TaskState::Preparing,
            1 => TaskState::Downloading,
            2 => TaskState::Completed,
            3 => TaskState::Cancelled,
            _ => TaskState::Error, // Unknown codes are treated as failures
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Preparing => "preparing",
            TaskState::Downloading => "downloading",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
            TaskState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Inclusion and layout flags forwarded to the transfer engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFlags {
    /// Download extra content (manuals, soundtracks, wallpapers)
    #[serde(default = "default_true")]
    pub extras: bool,
    /// Download DLC installers
    #[serde(default = "default_true")]
    pub dlc: bool,
    /// Resume partially downloaded files instead of restarting them
    #[serde(default = "default_true")]
    pub resume: bool,
    /// Put every file directly in the target directory (no platform subfolders)
    #[serde(default = "default_true")]
    pub flatten: bool,
    /// Skip patch files
    #[serde(default)]
    pub skip_patches: bool,
}

impl Default for DownloadFlags {
    fn default() -> Self {
        Self {
            extras: true,
            dlc: true,
            resume: true,
            flatten: true,
            skip_patches: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Everything needed to start (or later resume from the queue) a download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Game to download
    pub game_id: GameId,
    /// Display title, also used for the target directory name
    pub title: String,
    /// Base directory; files land in `<download_path>/<sanitized title>`
    pub download_path: PathBuf,
    /// Installer language, either a store name ("English") or a short code ("en")
    pub language: String,
    /// "all", "windows", "mac" or "linux"
    pub platform: String,
    /// Inclusion and layout flags
    pub flags: DownloadFlags,
    /// Number of parallel file workers the transfer engine may use
    pub threads: usize,
    /// Delete superseded installer versions once the download completes
    pub prune_old_versions: bool,
}

impl DownloadRequest {
    /// Create a request with default language, platform, flags and thread count
    pub fn new(game_id: GameId, title: impl Into<String>, download_path: impl Into<PathBuf>) -> Self {
        Self {
            game_id,
            title: title.into(),
            download_path: download_path.into(),
            language: "en".to_string(),
            platform: "windows".to_string(),
            flags: DownloadFlags::default(),
            threads: 5,
            prune_old_versions: false,
        }
    }
}

/// Outcome of a successful `start_download` call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free; the task was created and is now preparing
    Started {
        /// Instance id of the new task
        instance_id: i64,
    },
    /// The global limit was reached; the request waits in the FIFO queue
    Queued {
        /// 1-based position in the queue
        position: usize,
    },
}

/// Read-only projection of a task for presentation layers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Game being downloaded
    pub game_id: GameId,
    /// Creation timestamp (Unix nanoseconds), unique per attempt
    pub instance_id: i64,
    /// Display title
    pub title: String,
    /// Current state
    pub state: TaskState,
    /// One-line status
    pub status_text: String,
    /// Speed/ETA line
    pub details_text: String,
    /// Overall progress in [0, 1]
    pub progress: f64,
    /// Multi-line summary of files in flight
    pub file_status_text: String,
    /// Final target directory
    pub download_path: PathBuf,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Request is waiting for a free slot
    Queued {
        /// Game id
        game_id: GameId,
        /// Game title
        title: String,
        /// 1-based queue position
        position: usize,
    },

    /// Queued request was cancelled before it started
    Removed {
        /// Game id
        game_id: GameId,
    },

    /// Task created, preparing (token and metadata)
    Started {
        /// Game id
        game_id: GameId,
        /// Task instance
        instance_id: i64,
        /// Game title
        title: String,
    },

    /// First file progress arrived
    Downloading {
        /// Game id
        game_id: GameId,
        /// Task instance
        instance_id: i64,
    },

    /// Throughput sample published
    Progress {
        /// Game id
        game_id: GameId,
        /// Task instance
        instance_id: i64,
        /// Overall progress in [0, 1]
        progress: f64,
        /// Speed/ETA line
        details: String,
    },

    /// Download finished successfully
    Completed {
        /// Game id
        game_id: GameId,
        /// Task instance
        instance_id: i64,
        /// Target directory
        path: PathBuf,
    },

    /// Download was cancelled by the user
    Cancelled {
        /// Game id
        game_id: GameId,
        /// Task instance
        instance_id: i64,
    },

    /// Download failed
    Failed {
        /// Game id
        game_id: GameId,
        /// Task instance
        instance_id: i64,
        /// Error message
        error: String,
    },

    /// Superseded installers were removed after completion
    Pruned {
        /// Game id
        game_id: GameId,
        /// Number of deleted files
        deleted: usize,
    },

    /// Terminal tasks were removed from the registry
    HistoryCleared {
        /// Number of removed tasks
        removed: usize,
    },
}
