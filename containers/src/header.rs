use crate::{Bytes32, Epoch};
use serde::{Deserialize, Serialize};
use std::fmt;

/// PoW chain header as seen by the relayer.
///
/// Only the fields needed for ancestry tracking are kept. Everything else a
/// node returns is owned by the downstream pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Block hash.
    pub hash: Bytes32,
    /// Hash of the parent block.
    pub parent_hash: Bytes32,
    /// Block number (height).
    pub number: u64,
}

impl Header {
    pub fn new(hash: Bytes32, parent_hash: Bytes32, number: u64) -> Self {
        Self {
            hash,
            parent_hash,
            number,
        }
    }

    pub fn epoch(&self) -> Epoch {
        Epoch::of(self.number)
    }

    /// Short `(number, hash)` identifier used in logs.
    pub fn id(&self) -> HeaderId {
        HeaderId(self.number, self.hash)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeaderId(pub u64, pub Bytes32);

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.0, self.1)
    }
}
