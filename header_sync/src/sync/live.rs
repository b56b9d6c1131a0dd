//! Live sync: follows new heads and forwards their finalized ancestry.
//!
//! Every new head is inserted into the header cache. Once catch-up is done,
//! each head triggers ancestry forwarding: the walk goes from the head
//! through its parents, resolving each one from the cache or by hash, until
//! it meets a header that was already forwarded or that catch-up covered.
//! Headers at least `descendants_until_final` below the head are then pushed
//! oldest first. Missed notifications, forks and reorgs within the
//! finality depth therefore never leave a gap or a duplicate downstream.
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use containers::{Bytes32, Header};
use futures::StreamExt;
use metrics::SharedMetrics;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{config::SyncConfig, header_cache::HeaderCache, states::SharedSyncStatus};
use crate::types::ChainConnection;

/// Outcome of resolving a parent during an ancestry walk.
enum Parent {
    Found(Header),
    /// Below the header cache window and at or below the highest forwarded
    /// height, so already forwarded.
    TooOld,
    /// Could not be fetched. The next head walks this ancestry again.
    Unavailable,
}

pub struct LiveSync<C: ChainConnection> {
    chain: Arc<C>,
    cache: HeaderCache,
    status: SharedSyncStatus,
    output: mpsc::Sender<Header>,
    descendants_until_final: u64,
    /// Highest height pushed by this task.
    forwarded_height: Option<u64>,
    metrics: Option<SharedMetrics>,
}

impl<C: ChainConnection> LiveSync<C> {
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
            cache: HeaderCache::new(init_height, config.num_heights_to_track),
            status,
            output,
            descendants_until_final: config.descendants_until_final,
            forwarded_height: None,
            metrics,
        }
    }

    pub fn header_cache(&self) -> &HeaderCache {
        &self.cache
    }

    /// Follow new heads until the subscription fails or ends.
    pub async fn run(mut self) -> Result<()> {
        let mut heads = self
            .chain
            .subscribe_new_heads()
            .await
            .context("failed to subscribe to new heads")?;
        info!("Subscribed to new heads");

        while let Some(head) = heads.next().await {
            let head = head.context("new heads subscription failed")?;
            self.process_head(head).await?;
        }

        warn!("New heads subscription ended");
        bail!("new heads subscription ended")
    }

    /// Track a new head and, once catch-up is done, forward its finalized
    /// ancestry.
    pub async fn process_head(&mut self, head: Header) -> Result<()> {
        debug!(head = %head.id(), "New head");

        if !self.cache.insert(head.clone()) {
            debug!(head = %head.id(), "Head below tracked window, ignoring");
            return Ok(());
        }

        let live_start_height = {
            let mut status = self.status.lock();
            let latest = &mut status.latest;
            latest.height = latest.height.max(head.number);
            latest
                .fetch_finalized_done
                .then_some(latest.live_start_height)
        };
        if let Some(metrics) = &self.metrics {
            metrics.set_latest_head(head.number);
        }

        match live_start_height {
            Some(floor) => self.forward_ancestry(head, floor).await,
            None => Ok(()),
        }
    }

    async fn forward_ancestry(&mut self, head: Header, floor: u64) -> Result<()> {
        let Some(boundary) = head.number.checked_sub(self.descendants_until_final) else {
            return Ok(());
        };

        // Walk down to the first forwarded ancestor, collecting final headers
        // newest first.
        let mut pending = Vec::new();
        let mut next = head;
        loop {
            if next.number < floor {
                break;
            }
            if self.cache.get(&next.hash).is_some_and(|entry| entry.forwarded) {
                break;
            }
            if next.number <= boundary {
                pending.push(next.clone());
            }
            if next.number == floor || next.parent_hash.is_zero() {
                break;
            }

            next = match self.resolve_parent(&next).await {
                Parent::Found(parent) => parent,
                Parent::TooOld => break,
                Parent::Unavailable => {
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_ancestry_forward_failures();
                    }
                    return Ok(());
                }
            };
        }

        if !pending.is_empty() {
            debug!(
                count = pending.len(),
                boundary,
                "Forwarding finalized ancestry"
            );
        }
        while let Some(header) = pending.pop() {
            self.forward(header).await?;
        }

        Ok(())
    }

    async fn resolve_parent(&mut self, child: &Header) -> Parent {
        let hash = child.parent_hash;
        if let Some(entry) = self.cache.get(&hash) {
            return Parent::Found(entry.header.clone());
        }

        match self.chain.header_by_hash(hash).await {
            Ok(Some(parent)) if is_parent_of(&parent, hash, child) => {
                if self.cache.insert(parent.clone()) {
                    return Parent::Found(parent);
                }
                // Pruned entries lose their forwarded flag, so only the
                // forwarded height tells whether this one was pushed.
                if self
                    .forwarded_height
                    .is_some_and(|forwarded| parent.number <= forwarded)
                {
                    return Parent::TooOld;
                }
                debug!(
                    parent = %parent.id(),
                    min_height = self.cache.min_height(),
                    "Walking unforwarded ancestry below header cache window"
                );
                Parent::Found(parent)
            }
            Ok(Some(other)) => {
                warn!(
                    child = %child.id(),
                    returned = %other.id(),
                    "Node returned a header that is not the requested parent"
                );
                Parent::Unavailable
            }
            Ok(None) => {
                warn!(child = %child.id(), parent = %hash, "Parent header not found");
                Parent::Unavailable
            }
            Err(err) => {
                warn!(child = %child.id(), parent = %hash, error = %err, "Failed to fetch parent header");
                Parent::Unavailable
            }
        }
    }

    async fn forward(&mut self, header: Header) -> Result<()> {
        let number = header.number;
        let hash = header.hash;
        debug!(header = %header.id(), "Forwarding finalized header");

        self.output
            .send(header)
            .await
            .map_err(|_| anyhow!("output queue closed"))?;
        self.cache.mark_forwarded(&hash);
        self.forwarded_height = Some(self.forwarded_height.map_or(number, |h| h.max(number)));

        if let Some(metrics) = &self.metrics {
            metrics.set_forwarded_height(number);
            metrics.inc_headers_forwarded("live");
        }
        Ok(())
    }
}

fn is_parent_of(parent: &Header, hash: Bytes32, child: &Header) -> bool {
    parent.hash == hash && parent.number.checked_add(1) == Some(child.number)
}
