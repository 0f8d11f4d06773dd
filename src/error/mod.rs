mod connection;
mod provision;
mod seed;
mod storage;
mod store;

pub use connection::{ConnectPhase, ConnectionError};
pub use provision::ProvisionError;
pub use seed::SeedError;
pub use storage::{ChangeFeedError, StorageError};
pub use store::StoreError;
