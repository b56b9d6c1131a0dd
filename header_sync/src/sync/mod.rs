/// Finalized header sync for the PoW side of the relayer.
///
/// Headers become final once `descendants_until_final` descendants exist.
/// The syncer forwards every finalized header exactly once, parent before
/// child, into a bounded queue:
///
/// - **Header Cache**: Height-pruned index of recent headers, forks included
/// - **Catch-Up Sync**: Fetches finalized headers by number from the start height
/// - **Live Sync**: Follows new heads and forwards their finalized ancestry
/// - **Syncer**: Runs both tasks in one supervised group
///
/// ## State Machine
///
/// - **IDLE**: Not started, or stopped
/// - **CATCHING_UP**: Catch-up is behind the finality boundary
/// - **FOLLOWING**: Live sync forwards finalized headers as heads arrive
pub mod catch_up;
pub mod config;
pub mod header_cache;
pub mod live;
pub mod service;
pub mod states;

pub use catch_up::CatchUpSync;
pub use config::*;
pub use header_cache::{HeaderCache, HeaderCacheEntry};
pub use live::LiveSync;
pub use service::{SyncHandle, Syncer};
pub use states::{LatestBlockInfo, SharedSyncStatus, SyncState, SyncStatus};

#[cfg(test)]
mod tests;
