/// Header sync configuration.
///
/// Finality depth, cache window, output queue size and catch-up retry pacing.
use std::time::Duration;

use backoff::ExponentialBackoff;
use chain::config::{DESCENDANTS_UNTIL_FINAL, NUM_HEIGHTS_TO_TRACK, OUTPUT_QUEUE_CAPACITY};
use chain::RelayerConfig;

/// First delay before retrying a failed catch-up fetch.
pub const INITIAL_BACKOFF_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on the delay between catch-up retries.
pub const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Confirmations after which a header is treated as final.
    pub descendants_until_final: u64,
    /// Width of the header cache window below the highest seen height.
    pub num_heights_to_track: u64,
    pub output_queue_capacity: usize,
    pub initial_backoff_interval: Duration,
    pub max_backoff_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            descendants_until_final: DESCENDANTS_UNTIL_FINAL,
            num_heights_to_track: NUM_HEIGHTS_TO_TRACK,
            output_queue_capacity: OUTPUT_QUEUE_CAPACITY,
            initial_backoff_interval: INITIAL_BACKOFF_INTERVAL,
            max_backoff_interval: MAX_BACKOFF_INTERVAL,
        }
    }
}

impl From<&RelayerConfig> for SyncConfig {
    fn from(config: &RelayerConfig) -> Self {
        Self {
            descendants_until_final: config.descendants_until_final,
            num_heights_to_track: config.num_heights_to_track,
            output_queue_capacity: config.output_queue_capacity,
            ..Self::default()
        }
    }
}

impl SyncConfig {
    /// Retry schedule for catch-up fetches. Never gives up; the interval is
    /// capped at `max_backoff_interval`.
    pub fn retry_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff_interval,
            current_interval: self.initial_backoff_interval,
            max_interval: self.max_backoff_interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
