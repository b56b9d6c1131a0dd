//! Height-bounded index of recently seen headers.
//!
//! Keeps every header within `num_heights_to_track` of the highest height
//! inserted, forks included, so ancestry can be resolved across gaps in the
//! new-heads subscription without refetching.
use std::collections::{BTreeMap, HashMap, HashSet};

use containers::{Bytes32, Header};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCacheEntry {
    pub header: Header,
    /// Set once ancestry forwarding has pushed this header downstream.
    pub forwarded: bool,
}

#[derive(Debug, Clone)]
pub struct HeaderCache {
    /// Entries indexed by block hash
    entries: HashMap<Bytes32, HeaderCacheEntry>,

    /// Hashes seen at each height (more than one on forks)
    by_height: BTreeMap<u64, HashSet<Bytes32>>,

    max_height: u64,
    min_height: u64,
    num_heights_to_track: u64,
}

impl HeaderCache {
    pub fn new(init_height: u64, num_heights_to_track: u64) -> Self {
        Self {
            entries: HashMap::new(),
            by_height: BTreeMap::new(),
            max_height: init_height,
            min_height: init_height.saturating_sub(num_heights_to_track),
            num_heights_to_track,
        }
    }

    /// Insert a header.
    ///
    /// Returns `false` without touching the cache if the header is below the
    /// tracked window. Such a header has already been forwarded. Inserting a
    /// known hash is a no-op. A new highest height moves the window up and
    /// prunes everything below it.
    pub fn insert(&mut self, header: Header) -> bool {
        if header.number < self.min_height {
            return false;
        }
        if self.entries.contains_key(&header.hash) {
            return true;
        }

        let number = header.number;
        self.by_height.entry(number).or_default().insert(header.hash);
        self.entries.insert(
            header.hash,
            HeaderCacheEntry {
                header,
                forwarded: false,
            },
        );

        if number > self.max_height {
            self.max_height = number;
            self.min_height = number.saturating_sub(self.num_heights_to_track);
            self.prune();
        }

        true
    }

    pub fn get(&self, hash: &Bytes32) -> Option<&HeaderCacheEntry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &Bytes32) -> bool {
        self.entries.contains_key(hash)
    }

    /// Flag a header as forwarded. Returns `false` if it is not cached.
    pub fn mark_forwarded(&mut self, hash: &Bytes32) -> bool {
        match self.entries.get_mut(hash) {
            Some(entry) => {
                entry.forwarded = true;
                true
            }
            None => false,
        }
    }

    /// All cached headers at `height`, in no particular order.
    pub fn headers_at(&self, height: u64) -> Vec<&Header> {
        self.by_height
            .get(&height)
            .into_iter()
            .flatten()
            .filter_map(|hash| self.entries.get(hash))
            .map(|entry| &entry.header)
            .collect()
    }

    pub fn min_height(&self) -> u64 {
        self.min_height
    }

    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self) {
        let kept = self.by_height.split_off(&self.min_height);
        let pruned = std::mem::replace(&mut self.by_height, kept);
        if pruned.is_empty() {
            return;
        }

        let mut removed = 0;
        for hash in pruned.into_values().flatten() {
            if self.entries.remove(&hash).is_some() {
                removed += 1;
            }
        }
        debug!(
            removed,
            min_height = self.min_height,
            max_height = self.max_height,
            "Pruned header cache"
        );
    }
}
