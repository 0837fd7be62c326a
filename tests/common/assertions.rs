//! Event-driven waiting helpers for integration tests

use gog_dl::{DownloadManager, Event, GameId, TaskState, TaskView};
use std::time::Duration;

/// Outcome of waiting for a download to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Download completed successfully
    Completed,
    /// Download failed with error
    Failed(String),
    /// Download was cancelled
    Cancelled,
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for the terminal event of `game_id` on an existing subscription
///
/// Subscribe before starting the download, otherwise fast downloads finish
/// before the receiver exists.
pub async fn wait_for_finish(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    game_id: GameId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { game_id: id, .. }) if id == game_id => {
                    return WaitResult::Completed;
                }
                Ok(Event::Failed {
                    game_id: id, error, ..
                }) if id == game_id => {
                    return WaitResult::Failed(error);
                }
                Ok(Event::Cancelled { game_id: id, .. }) if id == game_id => {
                    return WaitResult::Cancelled;
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Poll until the latest task of `game_id` reaches `state`
pub async fn wait_for_state(
    manager: &DownloadManager,
    game_id: GameId,
    state: TaskState,
    timeout: Duration,
) -> Option<TaskView> {
    tokio::time::timeout(timeout, async {
        loop {
            if let Some(view) = manager.task(game_id).filter(|v| v.state == state) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .ok()
}

/// Poll until no slot is held for `game_id`
pub async fn wait_for_release(manager: &DownloadManager, game_id: GameId, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        while manager.is_active(game_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
