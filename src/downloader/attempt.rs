//! Running one download attempt and finalizing it.
//!
//! Every admitted request runs as two tokio tasks: the attempt itself and a
//! supervisor awaiting its `JoinHandle`. The supervisor owns finalization
//! (terminal state, pruning, history, slot release), so it happens exactly
//! once even when the attempt panics.

use crate::error::Error;
use crate::metadata::resolve_language;
use crate::progress::{ProgressAggregator, ProgressTarget};
use crate::services::TransferJob;
use crate::types::{DownloadRequest, Event, TaskState};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DownloadManager;
use super::task::Task;
use super::updates::write_snapshots;

/// How an attempt ended
#[derive(Debug)]
pub(crate) enum Outcome {
    Completed,
    Cancelled,
    Failed(Error),
}

impl DownloadManager {
    /// Run `request` for `task` under a finalizing supervisor
    pub(crate) fn spawn_attempt(&self, task: Arc<Task>, request: DownloadRequest) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let attempt = tokio::spawn(
                manager
                    .clone()
                    .run_attempt(Arc::clone(&task), request.clone()),
            );

            let outcome = match attempt.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    tracing::error!(
                        game_id = task.game_id().0,
                        instance_id = task.instance_id(),
                        "download attempt panicked"
                    );
                    Outcome::Failed(Error::Other("download task panicked".to_string()))
                }
                Err(e) => Outcome::Failed(Error::Other(format!("download task aborted: {}", e))),
            };

            manager.finalize(task, request, outcome).await;
        })
    }

    /// Token, metadata, then transfer
    async fn run_attempt(self, task: Arc<Task>, request: DownloadRequest) -> Outcome {
        let game_id = request.game_id;
        let cancel = task.cancel_token().clone();

        let access_token =
            match until_cancelled(&cancel, self.services.auth.refresh_token()).await {
                None => return Outcome::Cancelled,
                Some(Ok(token)) => token,
                Some(Err(e)) => {
                    tracing::warn!(game_id = game_id.0, error = %e, "failed to refresh access token");
                    return Outcome::Failed(as_auth_error(e));
                }
            };

        let record = match until_cancelled(&cancel, self.services.metadata.get_by_id(game_id)).await
        {
            None => return Outcome::Cancelled,
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                tracing::warn!(game_id = game_id.0, error = %e, "failed to look up game record");
                return Outcome::Failed(as_metadata_error(e));
            }
        };

        let metadata = match self
            .services
            .metadata
            .parse_installer_metadata(&record.raw_metadata)
        {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(game_id = game_id.0, error = %e, "failed to parse installer metadata");
                return Outcome::Failed(as_metadata_error(e));
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(task.download_path()).await {
            tracing::warn!(
                game_id = game_id.0,
                path = %task.download_path().display(),
                error = %e,
                "failed to create target directory"
            );
            return Outcome::Failed(Error::Io(e));
        }

        let target: Arc<dyn ProgressTarget> = task.clone();
        let aggregator = Arc::new(ProgressAggregator::new(
            target,
            self.config.progress.clone(),
        ));

        let job = TransferJob {
            game_id,
            cancel: cancel.clone(),
            access_token,
            metadata,
            target_path: task.download_path().to_path_buf(),
            language: resolve_language(&request.language),
            platform: request.platform.to_lowercase(),
            flags: request.flags,
            threads: request.threads,
        };

        tracing::info!(
            game_id = game_id.0,
            language = %job.language,
            platform = %job.platform,
            threads = job.threads,
            "starting transfer"
        );

        match self.services.transfer.download_files(job, aggregator).await {
            Ok(()) => {
                if let Err(e) =
                    write_snapshots(task.download_path(), &request, &record.raw_metadata).await
                {
                    tracing::warn!(game_id = game_id.0, error = %e, "failed to write download snapshots");
                }
                Outcome::Completed
            }
            Err(e) if cancel.is_cancelled() || e.is_cancelled() => {
                tracing::debug!(game_id = game_id.0, error = %e, "transfer stopped after cancellation");
                Outcome::Cancelled
            }
            Err(e) => Outcome::Failed(as_transfer_error(e)),
        }
    }

    /// Record the outcome, prune, persist and hand the slot to the next request
    async fn finalize(&self, task: Arc<Task>, request: DownloadRequest, outcome: Outcome) {
        let game_id = task.game_id();
        let instance_id = task.instance_id();

        match outcome {
            Outcome::Completed => {
                task.mark_completed();
                tracing::info!(game_id = game_id.0, instance_id, "download completed");
            }
            Outcome::Cancelled => {
                task.mark_cancelled();
                tracing::info!(game_id = game_id.0, instance_id, "download cancelled");
            }
            Outcome::Failed(e) => {
                task.mark_failed(&e.to_string());
                tracing::error!(
                    game_id = game_id.0,
                    instance_id,
                    error = %e,
                    error_code = e.error_code(),
                    "download failed"
                );
            }
        }

        let prune = request.prune_old_versions || self.config.download.prune_after_download;
        if task.state() == TaskState::Completed && prune {
            self.prune(&task, &request).await;
        }

        if let Err(e) = self.persist_history().await {
            tracing::error!(game_id = game_id.0, error = %e, "failed to persist download history");
        }

        let mut next = self.gate.release(game_id);
        while let Some(queued) = next.take() {
            if self.is_accepting() {
                tracing::debug!(
                    released = game_id.0,
                    next = queued.game_id.0,
                    "starting next queued download"
                );
                self.start_admitted(queued);
                break;
            }
            // Shutdown began after the queue was popped; hand the slot back
            tracing::debug!(game_id = queued.game_id.0, "dropping queued download during shutdown");
            self.emit(Event::Removed {
                game_id: queued.game_id,
            });
            next = self.gate.release(queued.game_id);
        }
    }

    async fn prune(&self, task: &Task, request: &DownloadRequest) {
        let report = self
            .pruner
            .prune_old_versions(&request.download_path, &request.title)
            .await;

        for (path, reason) in &report.failed {
            let e = Error::Prune {
                path: path.clone(),
                reason: reason.clone(),
            };
            tracing::warn!(game_id = task.game_id().0, error = %e, "pruning left a superseded installer");
        }

        if !report.deleted.is_empty() {
            self.emit(Event::Pruned {
                game_id: task.game_id(),
                deleted: report.deleted.len(),
            });
        }
    }
}

/// Await `future` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

fn as_auth_error(e: Error) -> Error {
    match e {
        Error::Auth(_) => e,
        other => Error::Auth(other.to_string()),
    }
}

fn as_metadata_error(e: Error) -> Error {
    match e {
        Error::Metadata(_) => e,
        other => Error::Metadata(other.to_string()),
    }
}

fn as_transfer_error(e: Error) -> Error {
    match e {
        Error::Transfer(_) => e,
        other => Error::Transfer(other.to_string()),
    }
}
