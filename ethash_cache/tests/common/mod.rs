//! Shared loaders and helpers for proof cache tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use containers::{Bytes16, Epoch};
use ethash_cache::{CacheError, CacheLoader, EpochProofCache};
use parking_lot::Mutex;

/// Small but well-formed proof cache for `epoch`.
pub fn sample_cache(epoch: Epoch) -> EpochProofCache {
    let tag = epoch.0 as u8;
    EpochProofCache {
        epoch,
        merkle_root: Bytes16::from([tag; 16]),
        proof_length: 2,
        cache_length: 2,
        proofs: vec![Bytes16::from([tag; 16]); 4],
    }
}

/// Loader counting calls per epoch, optionally failing some of them.
#[derive(Default)]
pub struct CountingLoader {
    calls: Mutex<HashMap<Epoch, usize>>,
    always_fail: HashSet<Epoch>,
    fail_first: Mutex<HashSet<Epoch>>,
    wrong_epoch: bool,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(epochs: &[u64]) -> Self {
        Self {
            always_fail: epochs.iter().copied().map(Epoch).collect(),
            ..Self::default()
        }
    }

    pub fn failing_once(epochs: &[u64]) -> Self {
        Self {
            fail_first: Mutex::new(epochs.iter().copied().map(Epoch).collect()),
            ..Self::default()
        }
    }

    pub fn mislabelling() -> Self {
        Self {
            wrong_epoch: true,
            ..Self::default()
        }
    }

    pub fn calls(&self, epoch: u64) -> usize {
        self.calls.lock().get(&Epoch(epoch)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

impl CacheLoader for CountingLoader {
    fn make_cache(&self, epoch: Epoch) -> Result<EpochProofCache, CacheError> {
        *self.calls.lock().entry(epoch).or_default() += 1;

        if self.always_fail.contains(&epoch) || self.fail_first.lock().remove(&epoch) {
            return Err(CacheError::Load {
                epoch,
                reason: "generator unavailable".to_string(),
            });
        }
        if self.wrong_epoch {
            return Ok(sample_cache(epoch.next()));
        }
        Ok(sample_cache(epoch))
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
