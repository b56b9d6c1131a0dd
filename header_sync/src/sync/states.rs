/// Header sync state machine and the progress shared by the sync tasks.
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not started, or stopped after shutdown or a fatal error.
    #[default]
    Idle,

    /// Catch-up is fetching finalized headers by number.
    ///
    /// The live task already tracks new heads but forwards nothing until
    /// catch-up reaches the finality boundary.
    CatchingUp,

    /// Catch-up is done. Finalized headers are forwarded from live heads
    /// through ancestry forwarding.
    Following,
}

impl SyncState {
    pub fn can_transition_to(&self, target: SyncState) -> bool {
        match self {
            SyncState::Idle => matches!(target, SyncState::CatchingUp),
            SyncState::CatchingUp => matches!(target, SyncState::Following | SyncState::Idle),
            SyncState::Following => matches!(target, SyncState::Idle),
        }
    }
}

/// Chain progress as seen by the sync tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatestBlockInfo {
    /// Highest head height observed.
    pub height: u64,
    /// Set once by catch-up when it reaches the finality boundary.
    pub fetch_finalized_done: bool,
    /// First height left to the live task. Everything below was pushed by
    /// catch-up.
    pub live_start_height: u64,
}

#[derive(Debug, Default)]
pub struct SyncStatus {
    pub state: SyncState,
    pub latest: LatestBlockInfo,
}

pub type SharedSyncStatus = Arc<Mutex<SyncStatus>>;

impl SyncStatus {
    pub fn new(head: u64, init_height: u64) -> Self {
        Self {
            state: SyncState::Idle,
            latest: LatestBlockInfo {
                height: head,
                fetch_finalized_done: false,
                live_start_height: init_height,
            },
        }
    }

    /// Move to `target`, refusing invalid transitions.
    pub fn transition(&mut self, target: SyncState) -> bool {
        if self.state == target {
            return true;
        }
        if !self.state.can_transition_to(target) {
            warn!(from = ?self.state, to = ?target, "Invalid sync state transition attempted");
            return false;
        }

        info!(from = ?self.state, to = ?target, height = self.latest.height, "Sync state transition");
        self.state = target;
        true
    }
}
