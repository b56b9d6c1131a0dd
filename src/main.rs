mod pipeline;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chain::RelayerConfig;
use clap::Parser;
use ethash_cache::{CommandCacheLoader, DiskCacheLoader, EpochProofCacheManager};
use header_sync::{ChainConnection, EthereumRpcClient, SyncConfig, Syncer};
use metrics::server::{run_metrics_server, MetricsServerConfig};
use metrics::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::HeaderConsumer;

#[derive(Parser, Debug)]
struct Args {
    /// YAML relayer configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    rpc_url: Option<String>,

    /// First header to relay. Defaults to the current finalized height.
    #[arg(long)]
    init_height: Option<u64>,

    #[arg(long)]
    descendants_until_final: Option<u64>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    metrics_address: Option<IpAddr>,

    #[arg(long)]
    metrics_port: Option<u16>,
}

impl Args {
    fn relayer_config(&self) -> Result<RelayerConfig> {
        let mut config = match &self.config {
            Some(path) => RelayerConfig::load_from_file(path)
                .map_err(|err| anyhow!("failed to load {}: {err}", path.display()))?,
            None => RelayerConfig::default(),
        };

        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(init_height) = self.init_height {
            config.init_height = Some(init_height);
        }
        if let Some(descendants) = self.descendants_until_final {
            config.descendants_until_final = descendants;
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(address) = self.metrics_address {
            config.metrics_address = address;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.relayer_config()?;

    let metrics = Arc::new(Metrics::new());
    let metrics_config = MetricsServerConfig {
        metrics_address: config.metrics_address,
        metrics_port: config.metrics_port,
    };
    tokio::spawn({
        let metrics = metrics.clone();
        async move {
            if let Err(err) = run_metrics_server(metrics_config, metrics).await {
                error!(error = %err, "Metrics server exited");
            }
        }
    });

    let chain = EthereumRpcClient::connect(&config.rpc_url).await?;
    let init_height = match config.init_height {
        Some(height) => height,
        None => chain
            .best_block_number()
            .await?
            .saturating_sub(config.descendants_until_final),
    };
    info!(init_height, "Starting relayer");

    let loader = DiskCacheLoader::new(
        CommandCacheLoader::new(&config.generator_program, &config.generator_output_dir),
        &config.cache_dir,
        config.keep_epochs,
    )
    .context("failed to open proof cache directory")?;
    let manager =
        EpochProofCacheManager::with_metrics(init_height, loader, Some(metrics.clone()))
            .await
            .context("failed to load initial epoch proof cache")?;

    let cancel = CancellationToken::new();
    let syncer = Syncer::with_metrics(chain, SyncConfig::from(&config), Some(metrics));
    let (headers, sync) = syncer.start_sync(init_height, cancel.clone()).await?;

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel.cancel();
            }
        }
    });

    let consumer = HeaderConsumer::new(Arc::new(manager));
    let consumed = consumer.run(headers).await;
    if consumed.is_err() {
        cancel.cancel();
    }

    let synced = sync.join().await;
    let packaged = consumed?;
    synced?;

    info!(packaged, "Relayer stopped");
    Ok(())
}
