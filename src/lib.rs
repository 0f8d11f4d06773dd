pub mod config;
pub mod db;
pub mod error;
pub mod storage;
pub(crate) mod utils;

pub use config::Config;
pub use db::{Collection, Database, Document, Filter, IndexSpec};
pub use error::{StorageError, StoreError};
pub use storage::assets::{DirAssets, MemoryAssets, SeedAssets};
pub use storage::catalog::Catalog;
pub use storage::notifier::StorageListener;
pub use storage::{Storage, StorageHandle};
