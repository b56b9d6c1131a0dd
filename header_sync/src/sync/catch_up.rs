use std::sync::Arc;
use std::time::Duration;

/// Catch-up sync: fetches finalized headers by number.
///
/// Walks heights upward from the start height and pushes each canonical
/// header, one at a time, until it is within `descendants_until_final` of
/// the latest head. The head keeps moving while catch-up runs; the live task
/// raises it. Once caught up, catch-up hands the remaining heights to the
/// live task by recording `live_start_height` and exits.
use anyhow::{anyhow, Result};
use backoff::{backoff::Backoff, ExponentialBackoff};
use containers::Header;
use metrics::SharedMetrics;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    config::SyncConfig,
    states::{SharedSyncStatus, SyncState},
};
use crate::types::ChainConnection;

pub struct CatchUpSync<C: ChainConnection> {
    chain: Arc<C>,
    status: SharedSyncStatus,
    output: mpsc::Sender<Header>,
    /// Next height to fetch
    cursor: u64,
    descendants_until_final: u64,
    backoff: ExponentialBackoff,
    max_backoff_interval: Duration,
    metrics: Option<SharedMetrics>,
}

impl<C: ChainConnection> CatchUpSync<C> {
    pub fn new(
        chain: Arc<C>,
        status: SharedSyncStatus,
        output: mpsc::Sender<Header>,
        init_height: u64,
        config: &SyncConfig,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Self {
            chain,
            status,
            output,
            cursor: init_height,
            descendants_until_final: config.descendants_until_final,
            backoff: config.retry_backoff(),
            max_backoff_interval: config.max_backoff_interval,
            metrics,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!(from = self.cursor, "Catch-up sync started");

        while let Some(number) = self.next_height() {
            let header = self.fetch(number).await;
            debug!(header = %header.id(), "Forwarding finalized header");

            self.output
                .send(header)
                .await
                .map_err(|_| anyhow!("output queue closed"))?;
            if let Some(metrics) = &self.metrics {
                metrics.set_forwarded_height(number);
                metrics.inc_headers_forwarded("catch_up");
            }
            self.cursor += 1;
        }

        Ok(())
    }

    /// Next height to fetch, or `None` once caught up.
    ///
    /// Reaching the boundary and handing over to the live task happen under
    /// one lock so the live task never sees a half-finished hand-over.
    fn next_height(&mut self) -> Option<u64> {
        let mut status = self.status.lock();
        let latest = &mut status.latest;

        if self.cursor.saturating_add(self.descendants_until_final) <= latest.height {
            return Some(self.cursor);
        }

        latest.fetch_finalized_done = true;
        latest.live_start_height = self.cursor;
        info!(
            live_start_height = self.cursor,
            head = latest.height,
            "Catch-up sync reached finality boundary"
        );
        status.transition(SyncState::Following);
        None
    }

    /// Fetch the canonical header at `number`, retrying until it succeeds.
    async fn fetch(&mut self, number: u64) -> Header {
        loop {
            let error = match self.chain.header_by_number(number).await {
                Ok(Some(header)) if header.number == number => {
                    self.backoff.reset();
                    return header;
                }
                Ok(Some(header)) => anyhow!("node returned block {} instead", header.number),
                Ok(None) => anyhow!("block not available"),
                Err(err) => err,
            };

            let delay = self
                .backoff
                .next_backoff()
                .unwrap_or(self.max_backoff_interval);
            warn!(
                number,
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Failed to fetch header, retrying"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_rpc_retries("header_by_number");
            }
            tokio::time::sleep(delay).await;
        }
    }
}
