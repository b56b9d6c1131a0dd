pub mod epoch;
pub mod header;
pub mod types;

pub use epoch::{Epoch, EPOCH_LENGTH};
pub use header::Header;
pub use types::{Bytes16, Bytes32};
