use containers::Epoch;
use thiserror::Error;

/// Epoch proof cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The loader could not produce the cache.
    #[error("failed to load proof cache for epoch {epoch}: {reason}")]
    Load { epoch: Epoch, reason: String },
    /// Loader produced a cache tagged with another epoch.
    #[error("loader returned proof cache for epoch {got} while epoch {expected} was requested")]
    EpochMismatch { expected: Epoch, got: Epoch },
    /// The current/next double buffer was found in an impossible state.
    #[error("proof cache invariant violated: {0}")]
    InvariantViolation(String),
    /// Background preparation worker or blocking load task died.
    #[error("proof cache worker failed: {0}")]
    Worker(String),
    #[error("proof cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode proof cache: {0}")]
    Decode(#[from] serde_json::Error),
}
