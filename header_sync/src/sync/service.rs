use std::future::Future;
use std::sync::Arc;

/// Syncer coordinating catch-up and live header sync.
///
/// `start_sync` runs both tasks in one task group under a supervisor. The
/// first task error cancels the shared token, aborts the other task and is
/// returned from `SyncHandle::join`. Both tasks feed one bounded output
/// queue, which closes once both have stopped.
use anyhow::{Context, Result};
use containers::Header;
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{
    catch_up::CatchUpSync,
    config::SyncConfig,
    live::LiveSync,
    states::{LatestBlockInfo, SharedSyncStatus, SyncState, SyncStatus},
};
use crate::types::ChainConnection;

pub struct Syncer<C: ChainConnection> {
    chain: Arc<C>,
    config: SyncConfig,
    metrics: Option<SharedMetrics>,
}

impl<C: ChainConnection> Syncer<C> {
    pub fn new(chain: C, config: SyncConfig) -> Self {
        Self::with_metrics(chain, config, None)
    }

    pub fn with_metrics(chain: C, config: SyncConfig, metrics: Option<SharedMetrics>) -> Self {
        Self {
            chain: Arc::new(chain),
            config,
            metrics,
        }
    }

    /// Start syncing finalized headers from `init_height`.
    ///
    /// Fetches the current head once, then spawns catch-up and live sync.
    /// Headers arrive on the returned receiver in parent-before-child order,
    /// each one exactly once.
    pub async fn start_sync(
        &self,
        init_height: u64,
        cancel: CancellationToken,
    ) -> Result<(mpsc::Receiver<Header>, SyncHandle)> {
        let head = self
            .chain
            .best_block_number()
            .await
            .context("failed to fetch best block number")?;
        info!(
            init_height,
            head,
            descendants_until_final = self.config.descendants_until_final,
            "Starting header sync"
        );
        if let Some(metrics) = &self.metrics {
            metrics.set_latest_head(head);
        }

        let status = Arc::new(Mutex::new(SyncStatus::new(head, init_height)));
        status.lock().transition(SyncState::CatchingUp);

        let (output, receiver) = mpsc::channel(self.config.output_queue_capacity);
        let catch_up = CatchUpSync::new(
            self.chain.clone(),
            status.clone(),
            output.clone(),
            init_height,
            &self.config,
            self.metrics.clone(),
        );
        let live = LiveSync::new(
            self.chain.clone(),
            status.clone(),
            output,
            init_height,
            &self.config,
            self.metrics.clone(),
        );

        let mut tasks = JoinSet::new();
        tasks.spawn(until_cancelled(cancel.clone(), catch_up.run()));
        tasks.spawn(until_cancelled(cancel.clone(), live.run()));
        let supervisor = tokio::spawn(supervise(tasks, cancel.clone(), status.clone()));

        Ok((
            receiver,
            SyncHandle {
                supervisor,
                cancel,
                status,
            },
        ))
    }
}

/// Handle to a running sync.
pub struct SyncHandle {
    supervisor: JoinHandle<Result<()>>,
    cancel: CancellationToken,
    status: SharedSyncStatus,
}

impl SyncHandle {
    pub fn state(&self) -> SyncState {
        self.status.lock().state
    }

    pub fn latest_block_info(&self) -> LatestBlockInfo {
        self.status.lock().latest
    }

    /// Ask both tasks to stop. The output queue closes once they have.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for both tasks, returning the first error either hit.
    pub async fn join(self) -> Result<()> {
        self.supervisor.await.context("sync supervisor failed")?
    }
}

async fn until_cancelled(
    cancel: CancellationToken,
    task: impl Future<Output = Result<()>>,
) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        result = task => result,
    }
}

async fn supervise(
    mut tasks: JoinSet<Result<()>>,
    cancel: CancellationToken,
    status: SharedSyncStatus,
) -> Result<()> {
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => continue,
            Err(err) => Err(anyhow::Error::new(err).context("sync task panicked")),
        };

        if let Err(err) = result {
            if first_error.is_none() {
                error!(error = %err, "Sync task failed, stopping header sync");
                cancel.cancel();
                tasks.abort_all();
                first_error = Some(err);
            }
        }
    }

    status.lock().transition(SyncState::Idle);
    info!("Header sync stopped");

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
