use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

pub use containers::EPOCH_LENGTH;

/// Confirmations after which a PoW header is treated as irreversible.
pub const DESCENDANTS_UNTIL_FINAL: u64 = 20;
/// Heights kept by the header cache below the highest seen head.
pub const NUM_HEIGHTS_TO_TRACK: u64 = 256;
/// Headers buffered between the syncer and its consumer.
pub const OUTPUT_QUEUE_CAPACITY: usize = 128;
/// Epoch proof caches kept on disk by the memoizing loader.
pub const KEEP_EPOCHS: usize = 3;

pub const METRICS_PORT: u16 = 9615;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RelayerConfig {
    /// WebSocket endpoint of the PoW chain node.
    pub rpc_url: String,
    /// First header to relay. `None` starts at the current finalized height.
    pub init_height: Option<u64>,
    pub descendants_until_final: u64,
    pub num_heights_to_track: u64,
    pub output_queue_capacity: usize,
    /// Directory memoizing epoch proof caches across restarts.
    pub cache_dir: PathBuf,
    pub keep_epochs: usize,
    /// External ethash proof generator, invoked as `<program> cache <epoch>`.
    pub generator_program: PathBuf,
    /// Directory the generator writes `<epoch>.json` into.
    pub generator_output_dir: PathBuf,
    pub metrics_address: IpAddr,
    pub metrics_port: u16,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "ws://127.0.0.1:8546".to_string(),
            init_height: None,
            descendants_until_final: DESCENDANTS_UNTIL_FINAL,
            num_heights_to_track: NUM_HEIGHTS_TO_TRACK,
            output_queue_capacity: OUTPUT_QUEUE_CAPACITY,
            cache_dir: PathBuf::from(".ethash-cache"),
            keep_epochs: KEEP_EPOCHS,
            generator_program: PathBuf::from("ethashproof"),
            generator_output_dir: PathBuf::from(".ethashproof"),
            metrics_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            metrics_port: METRICS_PORT,
        }
    }
}

impl RelayerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: RelayerConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;

        info!(path = %path.display(), rpc_url = %config.rpc_url, "Relayer config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rpc_url.is_empty() {
            return Err("rpc_url must not be empty".to_string());
        }
        if self.num_heights_to_track < self.descendants_until_final {
            return Err(format!(
                "num_heights_to_track ({}) must cover descendants_until_final ({})",
                self.num_heights_to_track, self.descendants_until_final
            ));
        }
        if self.output_queue_capacity == 0 {
            return Err("output_queue_capacity must be positive".to_string());
        }
        Ok(())
    }
}
