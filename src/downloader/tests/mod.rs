use super::test_helpers::*;
use crate::error::{DownloadError, Error};
use crate::types::{Admission, DownloadRequest, Event, GameId, TaskState};
use std::sync::Arc;
use std::time::Duration;

mod control;

/// Drain every event currently buffered in `rx`
fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
