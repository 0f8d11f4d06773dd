use thiserror::Error as ThisError;

use super::connection::ConnectionError;
use super::provision::ProvisionError;
use super::seed::SeedError;
use super::store::StoreError;

/// Fatal startup errors. Any of these aborts `Storage::start`.
#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Seeding '{collection}' failed: {source}")]
    Seed {
        collection: String,
        #[source]
        source: SeedError,
    },

    #[error("Pruning '{collection}' failed: {source}")]
    Prune {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Storage handle assembly failed: collection '{0}' was not provisioned")]
    Assembly(String),
}

/// Change feed failures. Never fatal; logged by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ChangeFeedError {
    #[error("Change feed lagged; {0} events skipped")]
    Lagged(u64),

    #[error("Change feed closed")]
    Closed,
}
