//! JSON-RPC (WebSocket) connection to an Ethereum-style PoW node.

use alloy_primitives::{B256, U64};
use anyhow::{Context, Result};
use containers::{Bytes32, Header};
use futures::StreamExt;
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Deserialize;
use tracing::info;

use crate::types::{ChainConnection, HeaderStream};

/// The subset of a block object the relayer reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcHeader {
    hash: B256,
    parent_hash: B256,
    number: U64,
}

impl From<RpcHeader> for Header {
    fn from(header: RpcHeader) -> Self {
        Header::new(
            Bytes32(header.hash),
            Bytes32(header.parent_hash),
            header.number.to::<u64>(),
        )
    }
}

pub struct EthereumRpcClient {
    client: WsClient,
}

impl EthereumRpcClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = WsClientBuilder::default()
            .build(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;

        info!(url, "Connected to PoW node");
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ChainConnection for EthereumRpcClient {
    async fn best_block_number(&self) -> Result<u64> {
        let number: U64 = self
            .client
            .request("eth_blockNumber", rpc_params![])
            .await
            .context("eth_blockNumber failed")?;
        Ok(number.to::<u64>())
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<Header>> {
        let header: Option<RpcHeader> = self
            .client
            .request("eth_getBlockByNumber", rpc_params![U64::from(number), false])
            .await
            .with_context(|| format!("eth_getBlockByNumber({number}) failed"))?;
        Ok(header.map(Header::from))
    }

    async fn header_by_hash(&self, hash: Bytes32) -> Result<Option<Header>> {
        let header: Option<RpcHeader> = self
            .client
            .request("eth_getBlockByHash", rpc_params![hash, false])
            .await
            .with_context(|| format!("eth_getBlockByHash({hash}) failed"))?;
        Ok(header.map(Header::from))
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream> {
        let subscription: Subscription<RpcHeader> = self
            .client
            .subscribe("eth_subscribe", rpc_params!["newHeads"], "eth_unsubscribe")
            .await
            .context("eth_subscribe(newHeads) failed")?;

        Ok(subscription
            .map(|item| item.map(Header::from).map_err(anyhow::Error::from))
            .boxed())
    }
}
