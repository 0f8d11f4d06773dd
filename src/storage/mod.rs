//! Storage bootstrap.
//!
//! [`Storage::start`] runs the whole startup sequence: connect, then for every
//! catalog entry in order create the collection and its indexes, prune it and
//! run its seeds, then start the change notifier. Any failure before the
//! notifier starts closes the connection and is returned; no partially
//! initialized handle is ever handed out.

pub mod assets;
pub mod catalog;
pub mod notifier;
pub mod provision;
pub mod seed;

use std::collections::BTreeMap;
use std::sync::Arc;

use health_model::{AccessRule, CRules, County, EManualTest, SymptomGroup, Symptoms, UinOverride};
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::db::{self, Collection, Database, Document};
use crate::error::StorageError;
use assets::SeedAssets;
use catalog::{Catalog, CollectionDescriptor, names};
use notifier::{ChangeNotifier, NotifierHandle, StorageListener, WatchState};
use seed::{SeedContext, SeedOutcome};

pub struct Storage {
    db: Database,
    collections: StorageHandle,
    notifier: NotifierHandle,
}

impl Storage {
    pub async fn start(
        cfg: &StorageConfig,
        catalog: Catalog,
        assets: Arc<dyn SeedAssets>,
        listener: Arc<dyn StorageListener>,
    ) -> Result<Self, StorageError> {
        catalog.validate()?;

        let db = db::connect(&cfg.database_url, &cfg.database_name, cfg.timeout()).await?;

        let collections = match bootstrap(&db, &catalog, assets.as_ref())
            .await
            .and_then(StorageHandle::assemble)
        {
            Ok(collections) => collections,
            Err(e) => {
                warn!(database = db.name(), error = %e, "storage startup failed; closing connection");
                db.close().await;
                return Err(e);
            }
        };

        let notifier = ChangeNotifier::new(listener, names::CONFIGS).spawn(db.watch());

        info!(database = db.name(), collections = catalog.len(), "storage started");
        Ok(Self {
            db,
            collections,
            notifier,
        })
    }

    pub fn collections(&self) -> &StorageHandle {
        &self.collections
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn notifier_state(&self) -> WatchState {
        self.notifier.state()
    }

    /// Stops the notifier and closes the connection.
    pub async fn stop(self) {
        self.notifier.abort();
        self.db.close().await;
        info!(database = self.db.name(), "storage stopped");
    }
}

async fn bootstrap(
    db: &Database,
    catalog: &Catalog,
    assets: &dyn SeedAssets,
) -> Result<BTreeMap<String, Collection>, StorageError> {
    let mut ready = BTreeMap::new();
    for descriptor in catalog.iter() {
        let collection = provision::ensure(db, descriptor).await?;

        if let Some(policy) = &descriptor.prune {
            seed::prune(&collection, &policy.filter)
                .await
                .map_err(|source| StorageError::Prune {
                    collection: descriptor.name.to_string(),
                    source,
                })?;
        }

        run_seeds(descriptor, &collection, &SeedContext::new(&ready, assets)).await?;
        ready.insert(descriptor.name.to_string(), collection);
    }
    Ok(ready)
}

async fn run_seeds(
    descriptor: &CollectionDescriptor,
    collection: &Collection,
    ctx: &SeedContext<'_>,
) -> Result<(), StorageError> {
    for policy in &descriptor.seeds {
        match policy.apply(collection, ctx).await {
            Ok(SeedOutcome::Inserted(count)) => {
                info!(collection = descriptor.name, seed = %policy.label(), count, "seeded");
            }
            Ok(SeedOutcome::AlreadyPresent(_)) => {}
            Err(e) if e.is_duplicate_key() => {
                warn!(
                    collection = descriptor.name,
                    seed = %policy.label(),
                    error = %e,
                    "seed already inserted by another writer"
                );
            }
            Err(source) => {
                return Err(StorageError::Seed {
                    collection: descriptor.name.to_string(),
                    source,
                });
            }
        }
    }
    Ok(())
}

macro_rules! storage_handle {
    ($($field:ident: $ty:ty = $name:path;)*) => {
        /// Typed handles to every provisioned collection. Cheap to clone.
        #[derive(Debug, Clone)]
        pub struct StorageHandle {
            $($field: Collection<$ty>,)*
        }

        impl StorageHandle {
            fn assemble(mut ready: BTreeMap<String, Collection>) -> Result<Self, StorageError> {
                let mut take = |name: &str| {
                    ready
                        .remove(name)
                        .ok_or_else(|| StorageError::Assembly(name.to_string()))
                };
                Ok(Self {
                    $($field: take($name)?.typed(),)*
                })
            }

            $(
                pub fn $field(&self) -> &Collection<$ty> {
                    &self.$field
                }
            )*
        }
    };
}

storage_handle! {
    configs: Document = names::CONFIGS;
    users: Document = names::USERS;
    providers: Document = names::PROVIDERS;
    locations: Document = names::LOCATIONS;
    ctests: Document = names::CTESTS;
    manual_tests: Document = names::MANUAL_TESTS;
    emanual_tests: EManualTest = names::EMANUAL_TESTS;
    resources: Document = names::RESOURCES;
    faq: Document = names::FAQ;
    news: Document = names::NEWS;
    status: Document = names::STATUS;
    estatus: Document = names::ESTATUS;
    history: Document = names::HISTORY;
    ehistory: Document = names::EHISTORY;
    counties: County = names::COUNTIES;
    test_types: Document = names::TEST_TYPES;
    rules: Document = names::RULES;
    symptom_groups: SymptomGroup = names::SYMPTOM_GROUPS;
    symptom_rules: Document = names::SYMPTOM_RULES;
    symptoms: Symptoms = names::SYMPTOMS;
    crules: CRules = names::CRULES;
    trace_exposures: Document = names::TRACE_EXPOSURES;
    access_rules: AccessRule = names::ACCESS_RULES;
    uin_overrides: UinOverride = names::UIN_OVERRIDES;
}
