//! Error types for gog-dl
//!
//! This module provides the error taxonomy for the library:
//! - Request validation and admission errors, returned synchronously by `start_download`
//! - Collaborator failures (auth, metadata, transfer) that end a task in the `Error` state
//! - History storage errors (JSON file or SQLite backend)
//! - Machine-readable error codes for consumers that need to branch on the failure kind

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gog-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gog-dl
///
/// Each variant carries enough context to be rendered directly into a task's
/// status text.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_threads")
        key: Option<String>,
    },

    /// A download request was rejected before admission
    #[error("invalid request: {field}: {reason}")]
    Validation {
        /// Request field that failed validation
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Download lifecycle error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// The auth collaborator could not provide an access token
    #[error("failed to obtain access token: {0}")]
    Auth(String),

    /// Installer metadata could not be looked up or parsed
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The transfer engine reported a network or disk failure
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Best-effort cleanup of superseded installers failed
    #[error("failed to prune {path}: {reason}")]
    Prune {
        /// File or directory that could not be pruned
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Download history could not be read or written
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Generic error for cases not covered by specific variants
    #[error("{0}")]
    Other(String),
}

/// Download lifecycle errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A download for this game is already active or queued
    #[error("download already in progress for game {game_id}")]
    InProgress {
        /// The game that already holds a slot
        game_id: i64,
    },

    /// The download was cancelled by the user
    #[error("download of game {game_id} was cancelled")]
    Cancelled {
        /// The cancelled game
        game_id: i64,
    },

    /// No active or queued download exists for this game
    #[error("no active or queued download for game {game_id}")]
    NotFound {
        /// The game that was looked up
        game_id: i64,
    },

    /// Operation not valid in current state
    #[error("cannot {operation} download of game {game_id} in state {current_state}")]
    InvalidState {
        /// The game the operation targeted
        game_id: i64,
        /// The operation that was attempted
        operation: String,
        /// The state the task is in
        current_state: String,
    },
}

/// History storage errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// History file could not be read or decoded
    #[error("failed to read history from {path}: {reason}")]
    ReadFailed {
        /// History file location
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// History file could not be written
    #[error("failed to write history to {path}: {reason}")]
    WriteFailed {
        /// History file location
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Failed to connect to the history database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run history schema migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// A history query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// Build a validation error for a request field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error represents a user-initiated cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Download(DownloadError::Cancelled { .. }))
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation { .. } => "validation_error",
            Error::Download(e) => match e {
                DownloadError::InProgress { .. } => "download_in_progress",
                DownloadError::Cancelled { .. } => "cancelled",
                DownloadError::NotFound { .. } => "download_not_found",
                DownloadError::InvalidState { .. } => "invalid_state",
            },
            Error::Auth(_) => "auth_error",
            Error::Metadata(_) => "metadata_error",
            Error::Transfer(_) => "transfer_error",
            Error::Prune { .. } => "prune_error",
            Error::History(_) => "history_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}
