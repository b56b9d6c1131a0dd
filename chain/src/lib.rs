pub mod config;

pub use config::RelayerConfig;
