//! One-time seeding and startup cleanup.
//!
//! Seeding is lookup-then-insert: a policy only inserts when its lookup filter
//! matches nothing. Across processes this is not atomic; the natural-key unique
//! indexes turn a concurrent double seed into a [`SeedError::Insert`] carrying a
//! duplicate-key error instead of a silent duplicate.

use async_trait::async_trait;
use health_model::{CRules, County, SymptomGroup, Symptoms};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::info;

use crate::db::{Collection, Filter};
use crate::error::{SeedError, StoreError};
use crate::storage::assets::SeedAssets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Number of documents inserted.
    Inserted(usize),
    /// Number of documents that already matched the lookup filter.
    AlreadyPresent(u64),
}

/// What a seed policy may touch while it runs.
pub struct SeedContext<'a> {
    ready: &'a BTreeMap<String, Collection>,
    assets: &'a dyn SeedAssets,
}

impl<'a> SeedContext<'a> {
    pub fn new(ready: &'a BTreeMap<String, Collection>, assets: &'a dyn SeedAssets) -> Self {
        Self { ready, assets }
    }

    /// A collection that has already finished provisioning.
    pub fn collection(&self, seed: &str, name: &str) -> Result<&'a Collection, SeedError> {
        self.ready
            .get(name)
            .ok_or_else(|| SeedError::DependencyNotReady {
                seed: seed.to_string(),
                collection: name.to_string(),
            })
    }

    /// Loads an asset and passes it through as text.
    pub fn asset_text(&self, name: &str) -> Result<String, SeedError> {
        let bytes = self.assets.load(name).map_err(|source| SeedError::Asset {
            name: name.to_string(),
            source,
        })?;
        String::from_utf8(bytes)
            .map_err(|e| SeedError::Generator(format!("asset {name} is not valid UTF-8: {e}")))
    }
}

/// A declared one-time insertion into one collection.
#[async_trait]
pub trait SeedPolicy: Send + Sync {
    /// Name used in logs and errors.
    fn label(&self) -> String;

    /// Collections that must be provisioned before this policy runs.
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }

    async fn apply(
        &self,
        target: &Collection,
        ctx: &SeedContext<'_>,
    ) -> Result<SeedOutcome, SeedError>;
}

/// Inserts the documents built by `generator` unless `filter` already matches
/// something in `collection`.
pub async fn seed_if_absent<T, G, Fut>(
    collection: &Collection<T>,
    filter: &Filter,
    generator: G,
) -> Result<SeedOutcome, SeedError>
where
    T: Serialize + DeserializeOwned,
    G: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, SeedError>>,
{
    let existing = collection.count(filter).await.map_err(SeedError::Lookup)?;
    if existing > 0 {
        info!(
            collection = collection.name(),
            %filter,
            existing,
            "seed data already present, nothing to do"
        );
        return Ok(SeedOutcome::AlreadyPresent(existing));
    }

    info!(collection = collection.name(), %filter, "no seed data found, inserting initial data");
    let docs = generator().await?;
    let insert_err = |source: StoreError| SeedError::Insert {
        collection: collection.name().to_string(),
        source,
    };
    let inserted = match docs.as_slice() {
        [] => {
            return Err(SeedError::Generator(format!(
                "generator for {} produced no documents",
                collection.name()
            )));
        }
        [doc] => {
            collection.insert_one(doc).await.map_err(insert_err)?;
            1
        }
        docs => collection.insert_many(docs).await.map_err(insert_err)?.len(),
    };
    info!(collection = collection.name(), inserted, "seed data inserted");
    Ok(SeedOutcome::Inserted(inserted))
}

/// Removes every document matching `filter`. Zero matches is success.
pub async fn prune<T>(collection: &Collection<T>, filter: &Filter) -> Result<u64, StoreError> {
    let removed = collection.delete_many(filter).await?;
    if removed > 0 {
        info!(collection = collection.name(), %filter, removed, "pruned finalized documents");
    } else {
        info!(collection = collection.name(), %filter, "no finalized documents to prune");
    }
    Ok(removed)
}

/// Symptom definitions for one app version, from `symptoms_<version>.json`.
#[derive(Debug, Clone)]
pub struct VersionedContent {
    pub app_version: String,
    pub asset: String,
}

impl VersionedContent {
    pub fn symptoms(app_version: impl Into<String>) -> Self {
        let app_version = app_version.into();
        Self {
            asset: format!("symptoms_{app_version}.json"),
            app_version,
        }
    }
}

#[async_trait]
impl SeedPolicy for VersionedContent {
    fn label(&self) -> String {
        format!("{} (app_version {})", self.asset, self.app_version)
    }

    async fn apply(
        &self,
        target: &Collection,
        ctx: &SeedContext<'_>,
    ) -> Result<SeedOutcome, SeedError> {
        let symptoms = target.typed::<Symptoms>();
        let filter = Filter::eq("app_version", self.app_version.as_str());
        seed_if_absent(&symptoms, &filter, || async move {
            Ok(vec![Symptoms {
                id: None,
                app_version: self.app_version.clone(),
                items: ctx.asset_text(&self.asset)?,
            }])
        })
        .await
    }
}

/// Rules for one app version and one county, from `rules_<version>.json`.
///
/// The county is named in configuration and resolved to its id at seed time;
/// a missing county is fatal since the rules would be unreachable.
#[derive(Debug, Clone)]
pub struct RegionScopedContent {
    pub app_version: String,
    pub region: String,
    pub region_collection: &'static str,
    pub asset: String,
}

impl RegionScopedContent {
    pub fn county_rules(app_version: impl Into<String>, county: impl Into<String>) -> Self {
        let app_version = app_version.into();
        Self {
            asset: format!("rules_{app_version}.json"),
            app_version,
            region: county.into(),
            region_collection: super::catalog::names::COUNTIES,
        }
    }
}

#[async_trait]
impl SeedPolicy for RegionScopedContent {
    fn label(&self) -> String {
        format!(
            "{} (app_version {}, region {})",
            self.asset, self.app_version, self.region
        )
    }

    fn depends_on(&self) -> &[&'static str] {
        std::slice::from_ref(&self.region_collection)
    }

    async fn apply(
        &self,
        target: &Collection,
        ctx: &SeedContext<'_>,
    ) -> Result<SeedOutcome, SeedError> {
        let label = self.label();
        let regions = ctx
            .collection(&label, self.region_collection)?
            .typed::<County>();
        let region_filter = Filter::eq("name", self.region.as_str());
        let region = regions
            .find_one(&region_filter)
            .await
            .map_err(SeedError::Lookup)?
            .ok_or_else(|| SeedError::MissingDependency {
                seed: label,
                collection: self.region_collection.to_string(),
                filter: region_filter.to_string(),
            })?;

        let rules = target.typed::<CRules>();
        let filter = Filter::eq("app_version", self.app_version.as_str())
            .and("county_id", region.id.as_str());
        seed_if_absent(&rules, &filter, || async move {
            Ok(vec![CRules {
                id: None,
                app_version: self.app_version.clone(),
                county_id: region.id,
                data: ctx.asset_text(&self.asset)?,
            }])
        })
        .await
    }
}

/// Legacy default symptom groups, created only when the collection is empty.
#[derive(Debug, Clone)]
pub struct DefaultSymptomGroups {
    pub names: Vec<String>,
}

#[async_trait]
impl SeedPolicy for DefaultSymptomGroups {
    fn label(&self) -> String {
        format!("default symptom groups {:?}", self.names)
    }

    async fn apply(
        &self,
        target: &Collection,
        _ctx: &SeedContext<'_>,
    ) -> Result<SeedOutcome, SeedError> {
        let groups = target.typed::<SymptomGroup>();
        seed_if_absent(&groups, &Filter::all(), || async move {
            Ok(self
                .names
                .iter()
                .map(|name| SymptomGroup {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: name.clone(),
                    symptoms: Vec::new(),
                })
                .collect())
        })
        .await
    }
}
