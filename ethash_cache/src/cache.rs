use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use containers::{Bytes16, Epoch};
use serde::{Deserialize, Serialize};

use crate::CacheError;

/// Merkle-proof structure over the ethash dataset of one epoch.
///
/// `proofs` is a flat list holding `cache_length` proofs of `proof_length`
/// nodes each, as written by the proof generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochProofCache {
    pub epoch: Epoch,
    pub merkle_root: Bytes16,
    pub proof_length: u64,
    pub cache_length: u64,
    pub proofs: Vec<Bytes16>,
}

impl EpochProofCache {
    /// Whether this cache can be used for the block at `number`.
    pub fn covers(&self, number: u64) -> bool {
        Epoch::of(number) == self.epoch
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        let expected = self.cache_length.checked_mul(self.proof_length);
        if expected != Some(self.proofs.len() as u64) {
            return Err(CacheError::Load {
                epoch: self.epoch,
                reason: format!(
                    "expected {} x {} proof nodes, found {}",
                    self.cache_length,
                    self.proof_length,
                    self.proofs.len()
                ),
            });
        }
        Ok(())
    }

    /// Read and validate a cache stored as JSON.
    pub fn read_from_file(path: &Path) -> Result<Self, CacheError> {
        let reader = BufReader::new(File::open(path)?);
        let cache: EpochProofCache = serde_json::from_reader(reader)?;
        cache.validate()?;
        Ok(cache)
    }
}
