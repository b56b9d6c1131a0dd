use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of blocks sharing one ethash dataset.
pub const EPOCH_LENGTH: u64 = 30_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl PartialOrd for Epoch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Epoch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Epoch {
    /// Epoch containing the block at `number`.
    pub const fn of(number: u64) -> Self {
        Epoch(number / EPOCH_LENGTH)
    }

    /// First block number of this epoch.
    pub const fn start_block(self) -> u64 {
        self.0 * EPOCH_LENGTH
    }

    pub const fn next(self) -> Self {
        Epoch(self.0 + 1)
    }

    /// Previous epoch, `None` for epoch zero.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Epoch)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
