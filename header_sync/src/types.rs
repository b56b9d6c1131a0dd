use anyhow::Result;
use containers::{Bytes32, Header};
use futures::stream::BoxStream;
use std::sync::Arc;

/// Stream of new chain heads. An `Err` item or the end of the stream means
/// the subscription is gone.
pub type HeaderStream = BoxStream<'static, Result<Header>>;

/// Read access to the PoW chain.
///
/// Abstracts the node connection so the syncer can be driven by mocks.
#[async_trait::async_trait]
pub trait ChainConnection: Send + Sync + 'static {
    /// Number of the best block known to the node.
    async fn best_block_number(&self) -> Result<u64>;

    /// Canonical header at `number`, `None` if the node does not have it yet.
    async fn header_by_number(&self, number: u64) -> Result<Option<Header>>;

    /// Header with the given hash, canonical or not.
    async fn header_by_hash(&self, hash: Bytes32) -> Result<Option<Header>>;

    async fn subscribe_new_heads(&self) -> Result<HeaderStream>;
}

#[async_trait::async_trait]
impl<C: ChainConnection> ChainConnection for Arc<C> {
    async fn best_block_number(&self) -> Result<u64> {
        (**self).best_block_number().await
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<Header>> {
        (**self).header_by_number(number).await
    }

    async fn header_by_hash(&self, hash: Bytes32) -> Result<Option<Header>> {
        (**self).header_by_hash(hash).await
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream> {
        (**self).subscribe_new_heads().await
    }
}
