use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use containers::Epoch;
use tracing::{debug, info, warn};

use crate::{CacheError, CacheLoader, EpochProofCache};

const FILE_PREFIX: &str = "epoch-";
const FILE_SUFFIX: &str = ".json";

/// Memoizes another loader's output on local disk.
///
/// A restarted relayer then only pays for epochs it has never seen. At most
/// `keep_epochs` files are kept; the ones nearest to the last requested epoch
/// survive pruning.
pub struct DiskCacheLoader<L> {
    inner: L,
    dir: PathBuf,
    keep_epochs: usize,
}

impl<L: CacheLoader> DiskCacheLoader<L> {
    pub fn new(inner: L, dir: impl Into<PathBuf>, keep_epochs: usize) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            inner,
            dir,
            keep_epochs: keep_epochs.max(1),
        })
    }

    pub fn path(&self, epoch: Epoch) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", epoch.0))
    }

    /// Epochs currently stored, in ascending order.
    pub fn stored_epochs(&self) -> Result<Vec<Epoch>, CacheError> {
        let mut epochs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(epoch) = name.to_str().and_then(parse_file_name) {
                epochs.push(epoch);
            }
        }
        epochs.sort();
        Ok(epochs)
    }

    fn read_stored(&self, epoch: Epoch) -> Option<EpochProofCache> {
        let path = self.path(epoch);
        if !path.exists() {
            return None;
        }

        match EpochProofCache::read_from_file(&path) {
            Ok(cache) if cache.epoch == epoch => Some(cache),
            Ok(cache) => {
                warn!(
                    path = %path.display(),
                    stored_epoch = cache.epoch.0,
                    epoch = epoch.0,
                    "Stored proof cache has wrong epoch, regenerating"
                );
                None
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "Stored proof cache unreadable, regenerating");
                None
            }
        }
    }

    fn store(&self, cache: &EpochProofCache) -> Result<(), CacheError> {
        let path = self.path(cache.epoch);
        let tmp = path.with_extension("json.tmp");

        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, cache)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), "Stored proof cache");
        Ok(())
    }

    fn prune(&self, around: Epoch) -> Result<(), CacheError> {
        let mut epochs = self.stored_epochs()?;
        if epochs.len() <= self.keep_epochs {
            return Ok(());
        }

        epochs.sort_by_key(|epoch| epoch.0.abs_diff(around.0));
        for epoch in &epochs[self.keep_epochs..] {
            remove_if_exists(&self.path(*epoch))?;
            debug!(epoch = epoch.0, "Pruned stored proof cache");
        }
        Ok(())
    }
}

impl<L: CacheLoader> CacheLoader for DiskCacheLoader<L> {
    fn make_cache(&self, epoch: Epoch) -> Result<EpochProofCache, CacheError> {
        if let Some(cache) = self.read_stored(epoch) {
            info!(epoch = epoch.0, "Loaded proof cache from disk");
            return Ok(cache);
        }

        let cache = self.inner.make_cache(epoch)?;
        if cache.epoch != epoch {
            return Err(CacheError::EpochMismatch {
                expected: epoch,
                got: cache.epoch,
            });
        }

        // A cache that cannot be memoized is still usable.
        if let Err(err) = self.store(&cache).and_then(|()| self.prune(epoch)) {
            warn!(epoch = epoch.0, %err, "Failed to memoize proof cache");
        }
        Ok(cache)
    }
}

fn parse_file_name(name: &str) -> Option<Epoch> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
        .map(Epoch)
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}
