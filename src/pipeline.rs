//! Consumer side of the header queue.
//!
//! Every finalized header is paired with the ethash proof cache of its epoch
//! and handed to the relay pipeline. Building and submitting the relay
//! transaction happens downstream of this crate, so packaged headers are
//! logged here.
use std::sync::Arc;

use anyhow::{Context, Result};
use containers::Header;
use ethash_cache::{CacheLoader, EpochProofCache, EpochProofCacheManager};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A finalized header together with the proof cache needed to prove it.
#[derive(Debug, Clone)]
pub struct RelayHeader {
    pub header: Header,
    pub proof_cache: Arc<EpochProofCache>,
}

pub struct HeaderConsumer<L: CacheLoader> {
    manager: Arc<EpochProofCacheManager<L>>,
    last: Option<Header>,
}

impl<L: CacheLoader> HeaderConsumer<L> {
    pub fn new(manager: Arc<EpochProofCacheManager<L>>) -> Self {
        Self {
            manager,
            last: None,
        }
    }

    /// Package headers until the queue closes. Returns how many were packaged.
    pub async fn run(mut self, mut headers: mpsc::Receiver<Header>) -> Result<u64> {
        let mut packaged = 0;

        while let Some(header) = headers.recv().await {
            let relay = self.package(header).await?;
            info!(
                header = %relay.header.id(),
                epoch = relay.proof_cache.epoch.0,
                merkle_root = %relay.proof_cache.merkle_root,
                "Header ready for relay"
            );
            packaged += 1;
        }

        debug!(packaged, "Header queue closed");
        Ok(packaged)
    }

    pub async fn package(&mut self, header: Header) -> Result<RelayHeader> {
        if let Some(last) = &self.last {
            if header.parent_hash != last.hash {
                warn!(
                    header = %header.id(),
                    previous = %last.id(),
                    "Header does not extend the previously relayed one"
                );
            }
        }

        let proof_cache = self
            .manager
            .get_cache(header.number)
            .await
            .with_context(|| format!("no proof cache for header {}", header.id()))?;
        debug_assert!(proof_cache.covers(header.number));

        self.last = Some(header.clone());
        Ok(RelayHeader {
            header,
            proof_cache,
        })
    }
}
