//! Idempotent collection and index provisioning.

use tracing::{debug, info};

use crate::db::{Collection, Database, IndexSpec};
use crate::error::{ProvisionError, StoreError};
use crate::storage::catalog::CollectionDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    /// An index with the same name and uniqueness was already there.
    Existing,
}

/// Creates the collection if needed and ensures every declared index, one at
/// a time and in declaration order.
pub async fn ensure(
    db: &Database,
    descriptor: &CollectionDescriptor,
) -> Result<Collection, ProvisionError> {
    let name = descriptor.name;
    info!(collection = name, indexes = descriptor.indexes.len(), "apply {name} checks");

    let collection = db
        .collection(name)
        .map_err(|e| ProvisionError::store(name, e))?;
    collection
        .create()
        .await
        .map_err(|e| ProvisionError::store(name, e))?;

    for spec in &descriptor.indexes {
        ensure_index(&collection, spec).await?;
    }

    info!(collection = name, "{name} checks passed");
    Ok(collection)
}

/// Ensures one index exists exactly as declared.
///
/// An existing index with the same name but different uniqueness is an
/// [`ProvisionError::IndexConflict`]; it is never silently replaced.
pub async fn ensure_index<T>(
    collection: &Collection<T>,
    spec: &IndexSpec,
) -> Result<IndexOutcome, ProvisionError> {
    let name = collection.name();
    let index = spec.name();
    let existing = collection
        .indexes()
        .await
        .map_err(|e| ProvisionError::store(name, e))?;

    if let Some(found) = existing.iter().find(|info| info.name == index) {
        if found.unique != spec.is_unique() {
            return Err(ProvisionError::IndexConflict {
                collection: name.to_string(),
                index,
                existing_unique: found.unique,
                requested_unique: spec.is_unique(),
            });
        }
        debug!(collection = name, %spec, "index already present");
        return Ok(IndexOutcome::Existing);
    }

    match collection.create_index(spec).await {
        Ok(()) => {
            debug!(collection = name, %spec, "index created");
            Ok(IndexOutcome::Created)
        }
        Err(StoreError::DuplicateKey { message, .. }) => Err(ProvisionError::UniqueViolation {
            collection: name.to_string(),
            index,
            message,
        }),
        Err(e) => Err(ProvisionError::store(name, e)),
    }
}
