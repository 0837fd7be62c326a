//! Admission control: one slot per game, a global cap and a FIFO queue.

use crate::error::{DownloadError, Result};
use crate::types::{DownloadRequest, GameId};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Outcome of [`ConcurrencyGate::admit`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// The game now holds a slot
    Admitted,
    /// The request was appended to the queue
    Queued {
        /// 1-based queue position
        position: usize,
    },
}

struct GateState {
    active: HashSet<GameId>,
    queue: VecDeque<DownloadRequest>,
}

/// Tracks which games occupy a download slot and which wait for one
///
/// Both the active set and the queue sit behind one mutex, so admission,
/// release and the hand-over to the next queued request are atomic.
pub struct ConcurrencyGate {
    max_active: usize,
    state: Mutex<GateState>,
}

impl ConcurrencyGate {
    /// Create a gate allowing `max_active` concurrent downloads (at least one)
    pub fn new(max_active: usize) -> Self {
        Self {
            max_active: max_active.max(1),
            state: Mutex::new(GateState {
                active: HashSet::new(),
                queue: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim a slot for `game_id` regardless of the global cap
    ///
    /// Fails with `InProgress` if the game already holds a slot; nothing
    /// changes in that case.
    pub fn try_start(&self, game_id: GameId) -> Result<()> {
        let mut state = self.lock();
        if !state.active.insert(game_id) {
            return Err(DownloadError::InProgress {
                game_id: game_id.0,
            }
            .into());
        }
        Ok(())
    }

    /// Admit `request` now, or queue it when every slot is taken
    pub fn admit(&self, request: DownloadRequest) -> Result<GateDecision> {
        let mut state = self.lock();
        let game_id = request.game_id;

        if state.active.contains(&game_id) || state.queue.iter().any(|r| r.game_id == game_id) {
            return Err(DownloadError::InProgress {
                game_id: game_id.0,
            }
            .into());
        }

        if state.active.len() < self.max_active {
            state.active.insert(game_id);
            return Ok(GateDecision::Admitted);
        }

        state.queue.push_back(request);
        Ok(GateDecision::Queued {
            position: state.queue.len(),
        })
    }

    /// Give up the slot held by `game_id` and hand it to the oldest queued request
    ///
    /// Releasing a game that holds no slot is a no-op apart from the hand-over.
    /// The returned request already holds its slot and must be started.
    pub fn release(&self, game_id: GameId) -> Option<DownloadRequest> {
        let mut state = self.lock();
        state.active.remove(&game_id);

        while state.active.len() < self.max_active {
            let next = state.queue.pop_front()?;
            if state.active.insert(next.game_id) {
                return Some(next);
            }
            tracing::warn!(
                game_id = next.game_id.0,
                "dropping queued request for a game that already holds a slot"
            );
        }
        None
    }

    /// Remove a request that has not started yet
    pub fn cancel_queued(&self, game_id: GameId) -> Option<DownloadRequest> {
        let mut state = self.lock();
        let index = state.queue.iter().position(|r| r.game_id == game_id)?;
        state.queue.remove(index)
    }

    /// Empty the queue, returning what was waiting in order
    pub fn drain_queue(&self) -> Vec<DownloadRequest> {
        self.lock().queue.drain(..).collect()
    }

    /// Whether `game_id` holds a slot
    pub fn is_active(&self, game_id: GameId) -> bool {
        self.lock().active.contains(&game_id)
    }

    /// Number of occupied slots
    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Queued game ids, oldest first
    pub fn queued(&self) -> Vec<GameId> {
        self.lock().queue.iter().map(|r| r.game_id).collect()
    }
}
