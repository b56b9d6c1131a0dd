//! Epoch-keyed ethash dataset proof caches.
//!
//! An [`EpochProofCache`] is expensive to produce (minutes for a cold epoch)
//! and valid for exactly one 30,000-block epoch. The
//! [`EpochProofCacheManager`] keeps the cache for the current epoch ready and
//! prepares the following one in the background so that monotonically
//! increasing requests never wait on a load.
pub mod cache;
pub mod disk;
pub mod error;
pub mod loader;
pub mod manager;

pub use cache::EpochProofCache;
pub use disk::DiskCacheLoader;
pub use error::CacheError;
pub use loader::{CacheLoader, CommandCacheLoader};
pub use manager::EpochProofCacheManager;
