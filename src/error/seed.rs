use thiserror::Error as ThisError;

use super::store::StoreError;

#[derive(Debug, ThisError)]
pub enum SeedError {
    #[error("Seed '{seed}' requires a document in '{collection}' matching {filter}; none found")]
    MissingDependency {
        seed: String,
        collection: String,
        filter: String,
    },

    #[error("Seed '{seed}' depends on '{collection}', which is not provisioned yet")]
    DependencyNotReady { seed: String, collection: String },

    #[error("Seed asset '{name}' could not be loaded: {source}")]
    Asset {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Seed generator failed: {0}")]
    Generator(String),

    #[error("Seed lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("Seed insert into '{collection}' failed: {source}")]
    Insert {
        collection: String,
        #[source]
        source: StoreError,
    },
}

impl SeedError {
    /// True when another writer inserted the same natural key first.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, SeedError::Insert { source, .. } if source.is_duplicate_key())
    }
}
