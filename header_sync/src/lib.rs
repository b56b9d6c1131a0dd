pub mod rpc;
pub mod sync;
pub mod types;

pub use rpc::EthereumRpcClient;
pub use sync::{HeaderCache, SyncConfig, SyncHandle, SyncState, Syncer};
pub use types::{ChainConnection, HeaderStream};
