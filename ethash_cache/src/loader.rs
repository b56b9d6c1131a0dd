use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use containers::Epoch;
use tracing::info;

use crate::{CacheError, EpochProofCache};

/// Produces the proof cache of an epoch.
///
/// Loading is CPU and disk bound and may take minutes on a cold epoch, so
/// implementations are synchronous and the manager runs them on the blocking
/// thread pool.
pub trait CacheLoader: Send + Sync + 'static {
    fn make_cache(&self, epoch: Epoch) -> Result<EpochProofCache, CacheError>;
}

impl<L: CacheLoader + ?Sized> CacheLoader for Arc<L> {
    fn make_cache(&self, epoch: Epoch) -> Result<EpochProofCache, CacheError> {
        (**self).make_cache(epoch)
    }
}

/// Loader driving an external ethash proof generator.
///
/// The generator is invoked as `<program> cache <epoch>` and must leave the
/// result in `<output_dir>/<epoch>.json`.
#[derive(Debug, Clone)]
pub struct CommandCacheLoader {
    program: PathBuf,
    output_dir: PathBuf,
}

impl CommandCacheLoader {
    pub fn new(program: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
        }
    }

    fn output_path(&self, epoch: Epoch) -> PathBuf {
        self.output_dir.join(format!("{}.json", epoch.0))
    }
}

impl CacheLoader for CommandCacheLoader {
    fn make_cache(&self, epoch: Epoch) -> Result<EpochProofCache, CacheError> {
        info!(
            epoch = epoch.0,
            program = %self.program.display(),
            "Running ethash proof generator"
        );

        let status = Command::new(&self.program)
            .arg("cache")
            .arg(epoch.0.to_string())
            .status()?;

        if !status.success() {
            return Err(CacheError::Load {
                epoch,
                reason: format!("{} exited with {status}", self.program.display()),
            });
        }

        EpochProofCache::read_from_file(&self.output_path(epoch))
    }
}
