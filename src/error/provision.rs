use thiserror::Error as ThisError;

use super::store::StoreError;

#[derive(Debug, ThisError)]
pub enum ProvisionError {
    #[error("Invalid collection catalog: {0}")]
    Catalog(String),

    #[error("Invalid name '{name}' in collection '{collection}': {reason}")]
    InvalidName {
        collection: String,
        name: String,
        reason: &'static str,
    },

    #[error(
        "Index '{index}' on '{collection}' already exists with unique={existing_unique}, declared unique={requested_unique}"
    )]
    IndexConflict {
        collection: String,
        index: String,
        existing_unique: bool,
        requested_unique: bool,
    },

    #[error("Existing data in '{collection}' violates unique index '{index}': {message}")]
    UniqueViolation {
        collection: String,
        index: String,
        message: String,
    },

    #[error("Provisioning '{collection}' failed: {source}")]
    Store {
        collection: String,
        #[source]
        source: StoreError,
    },
}

impl ProvisionError {
    pub(crate) fn store(collection: &str, source: impl Into<StoreError>) -> Self {
        let source = source.into();
        match source {
            StoreError::InvalidName { name, reason } => ProvisionError::InvalidName {
                collection: collection.to_string(),
                name,
                reason,
            },
            source => ProvisionError::Store {
                collection: collection.to_string(),
                source,
            },
        }
    }
}
