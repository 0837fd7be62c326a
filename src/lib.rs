//! # gog-dl
//!
//! Download manager library for game installers.
//!
//! ## Design Philosophy
//!
//! gog-dl is designed to be:
//! - **Bounded** - At most `max_concurrent_downloads` games transfer at once,
//!   the rest wait in a FIFO queue
//! - **Resumable** - Cancelling or shutting down leaves partial files on disk
//! - **Library-first** - Authentication, catalogue lookup and the byte
//!   transfer are injected through [`services`] traits
//! - **Event-driven** - Consumers subscribe to [`Event`]s or poll
//!   [`DownloadManager::list_tasks`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use gog_dl::{Config, DownloadManager, GameId, Services};
//!
//! async fn run(services: Services) -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default(), services).await?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = manager.new_request(GameId(1207658924), "The Witcher");
//!     manager.start_download(request).await?;
//!
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download manager: admission, task lifecycle and history
pub mod downloader;
/// Error types
pub mod error;
/// Download history persistence
pub mod history;
/// Installer metadata model
pub mod metadata;
/// Progress stream aggregation
pub mod progress;
/// Removal of superseded installers
pub mod pruner;
/// External collaborator traits
pub mod services;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Installer version snapshots
pub mod version;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, HistoryBackend, PersistenceConfig, ProgressConfig};
pub use downloader::{ConcurrencyGate, DownloadInfo, DownloadManager, GateDecision};
pub use error::{DownloadError, Error, HistoryError, Result};
pub use history::{HistoryStore, JsonHistoryStore, PersistentTaskRecord, SqliteHistoryStore};
pub use metadata::{GameMetadata, GameRecord};
pub use progress::{ProgressAggregator, ProgressEvent, ProgressSink, ProgressTarget};
pub use pruner::{PruneReport, Pruner, RegexVersionExtractor, VersionExtractor};
pub use services::{AuthService, MetadataStore, Services, TransferEngine, TransferJob};
pub use types::{Admission, DownloadFlags, DownloadRequest, Event, GameId, TaskState, TaskView};
