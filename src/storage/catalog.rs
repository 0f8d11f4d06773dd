//! Declarative collection catalog.
//!
//! Every collection the service uses is declared here, in provisioning order,
//! with its indexes, startup prune rule and seed policies.

use std::collections::HashSet;
use std::fmt;

use health_model::ManualTestStatus;

use crate::config::SeedsConfig;
use crate::db::schema::{validate_collection_name, validate_field_path};
use crate::db::{Filter, IndexSpec};
use crate::error::ProvisionError;
use crate::storage::seed::{
    DefaultSymptomGroups, RegionScopedContent, SeedPolicy, VersionedContent,
};

pub mod names {
    pub const CONFIGS: &str = "configs";
    pub const USERS: &str = "users";
    pub const PROVIDERS: &str = "providers";
    pub const LOCATIONS: &str = "locations";
    pub const CTESTS: &str = "ctests";
    pub const MANUAL_TESTS: &str = "manualtests";
    pub const EMANUAL_TESTS: &str = "emanualtests";
    pub const RESOURCES: &str = "resources";
    pub const FAQ: &str = "faq";
    pub const NEWS: &str = "news";
    pub const STATUS: &str = "status";
    pub const ESTATUS: &str = "estatus";
    pub const HISTORY: &str = "history";
    pub const EHISTORY: &str = "ehistory";
    pub const COUNTIES: &str = "counties";
    pub const TEST_TYPES: &str = "testtypes";
    pub const RULES: &str = "rules";
    pub const SYMPTOM_GROUPS: &str = "symptomgroups";
    pub const SYMPTOM_RULES: &str = "symptomrules";
    pub const SYMPTOMS: &str = "symptoms";
    pub const CRULES: &str = "crules";
    pub const TRACE_EXPOSURES: &str = "traceexposures";
    pub const ACCESS_RULES: &str = "accessrules";
    pub const UIN_OVERRIDES: &str = "uinoverrides";
}

/// Documents matching `filter` are deleted on every startup.
#[derive(Debug, Clone)]
pub struct PrunePolicy {
    pub filter: Filter,
}

impl PrunePolicy {
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }
}

pub struct CollectionDescriptor {
    pub name: &'static str,
    pub indexes: Vec<IndexSpec>,
    pub prune: Option<PrunePolicy>,
    pub seeds: Vec<Box<dyn SeedPolicy>>,
}

impl CollectionDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            indexes: Vec::new(),
            prune: None,
            seeds: Vec::new(),
        }
    }

    #[must_use]
    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }

    #[must_use]
    pub fn prune(mut self, filter: Filter) -> Self {
        self.prune = Some(PrunePolicy::new(filter));
        self
    }

    #[must_use]
    pub fn seed(mut self, policy: impl SeedPolicy + 'static) -> Self {
        self.seeds.push(Box::new(policy));
        self
    }
}

impl fmt::Debug for CollectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDescriptor")
            .field("name", &self.name)
            .field("indexes", &self.indexes)
            .field("prune", &self.prune)
            .field(
                "seeds",
                &self.seeds.iter().map(|s| s.label()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    descriptors: Vec<CollectionDescriptor>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, descriptor: CollectionDescriptor) {
        self.descriptors.push(descriptor);
    }

    #[must_use]
    pub fn with(mut self, descriptor: CollectionDescriptor) -> Self {
        self.push(descriptor);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionDescriptor> {
        self.descriptors.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.name).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Checks names and declaration order before anything touches the store.
    ///
    /// A seed may only depend on collections declared before its own.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let mut declared = HashSet::new();
        for descriptor in &self.descriptors {
            let name = descriptor.name;
            validate_collection_name(name).map_err(|e| ProvisionError::store(name, e))?;
            for spec in &descriptor.indexes {
                if spec.keys().is_empty() {
                    return Err(ProvisionError::Catalog(format!(
                        "index on '{name}' declares no keys"
                    )));
                }
                for key in spec.keys() {
                    validate_field_path(&key.field).map_err(|e| ProvisionError::store(name, e))?;
                }
            }
            for seed in &descriptor.seeds {
                for dependency in seed.depends_on() {
                    if !declared.contains(dependency) {
                        return Err(ProvisionError::Catalog(format!(
                            "seed '{}' on '{name}' depends on '{dependency}', which is not declared before it",
                            seed.label()
                        )));
                    }
                }
            }
            if !declared.insert(name) {
                return Err(ProvisionError::Catalog(format!(
                    "collection '{name}' is declared more than once"
                )));
            }
        }
        Ok(())
    }

    /// The service's full set of collections.
    pub fn standard(seeds: &SeedsConfig) -> Self {
        use names::*;

        let asc = IndexSpec::ascending;
        let terminal = Filter::eq("status", ManualTestStatus::Verified.as_str());

        let mut symptoms = CollectionDescriptor::new(SYMPTOMS).index(asc("app_version").unique());
        for version in &seeds.symptom_versions {
            symptoms = symptoms.seed(VersionedContent::symptoms(version.as_str()));
        }

        let mut crules = CollectionDescriptor::new(CRULES)
            .index(asc("app_version"))
            .index(asc("county_id"))
            .index(asc("app_version").then_ascending("county_id").unique());
        for rule in &seeds.region_rules {
            crules = crules.seed(RegionScopedContent::county_rules(
                rule.app_version.as_str(),
                rule.county.as_str(),
            ));
        }

        let mut symptom_groups = CollectionDescriptor::new(SYMPTOM_GROUPS)
            .index(asc("symptoms.id"))
            .index(asc("name").unique());
        if !seeds.symptom_groups.is_empty() {
            symptom_groups = symptom_groups.seed(DefaultSymptomGroups {
                names: seeds.symptom_groups.clone(),
            });
        }

        Catalog::new()
            .with(CollectionDescriptor::new(CONFIGS))
            .with(
                CollectionDescriptor::new(USERS)
                    .index(asc("external_id").unique())
                    .index(asc("shibboleth_auth.uiucedu_uin"))
                    .index(asc("uuid"))
                    .index(asc("re_post")),
            )
            .with(CollectionDescriptor::new(PROVIDERS))
            .with(
                CollectionDescriptor::new(LOCATIONS)
                    .index(asc("provider_id"))
                    .index(asc("county_id")),
            )
            .with(
                CollectionDescriptor::new(CTESTS)
                    .index(asc("user_id"))
                    .index(asc("provider_id"))
                    .index(asc("order_number")),
            )
            .with(manual_tests(MANUAL_TESTS))
            .with(manual_tests(EMANUAL_TESTS).prune(terminal))
            .with(CollectionDescriptor::new(RESOURCES))
            .with(CollectionDescriptor::new(FAQ))
            .with(CollectionDescriptor::new(NEWS).index(asc("date")))
            .with(CollectionDescriptor::new(STATUS).index(asc("user_id").unique()))
            .with(
                CollectionDescriptor::new(ESTATUS)
                    .index(asc("user_id"))
                    .index(asc("app_version")),
            )
            .with(
                CollectionDescriptor::new(HISTORY)
                    .index(asc("user_id"))
                    .index(asc("date")),
            )
            .with(
                CollectionDescriptor::new(EHISTORY)
                    .index(asc("user_id"))
                    .index(asc("date")),
            )
            .with(
                CollectionDescriptor::new(COUNTIES)
                    .index(asc("guidelines.id"))
                    .index(asc("county_statuses.id"))
                    .index(asc("name")),
            )
            .with(CollectionDescriptor::new(TEST_TYPES).index(asc("results._id")))
            .with(
                CollectionDescriptor::new(RULES)
                    .index(asc("county_id"))
                    .index(asc("test_type_id")),
            )
            .with(symptom_groups)
            .with(CollectionDescriptor::new(SYMPTOM_RULES).index(asc("county_id").unique()))
            .with(symptoms)
            .with(crules)
            .with(
                CollectionDescriptor::new(TRACE_EXPOSURES)
                    .index(asc("date_added"))
                    .index(asc("timestamp")),
            )
            .with(CollectionDescriptor::new(ACCESS_RULES).index(asc("county_id").unique()))
            .with(
                CollectionDescriptor::new(UIN_OVERRIDES)
                    .index(asc("uin").unique())
                    .index(asc("category")),
            )
    }
}

fn manual_tests(name: &'static str) -> CollectionDescriptor {
    CollectionDescriptor::new(name)
        .index(IndexSpec::ascending("user_id"))
        .index(IndexSpec::ascending("location_id"))
        .index(IndexSpec::ascending("county_id"))
        .index(IndexSpec::ascending("status"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_valid_and_ordered() {
        let catalog = Catalog::standard(&SeedsConfig::default());
        catalog.validate().unwrap();
        assert_eq!(catalog.len(), 24);
        let order = catalog.names();
        assert_eq!(order.first(), Some(&names::CONFIGS));
        assert_eq!(order.last(), Some(&names::UIN_OVERRIDES));
        let counties = order.iter().position(|n| *n == names::COUNTIES).unwrap();
        let crules = order.iter().position(|n| *n == names::CRULES).unwrap();
        assert!(counties < crules);
    }

    #[test]
    fn only_emanual_tests_prune() {
        let catalog = Catalog::standard(&SeedsConfig::default());
        let pruned: Vec<_> = catalog
            .iter()
            .filter(|d| d.prune.is_some())
            .map(|d| d.name)
            .collect();
        assert_eq!(pruned, vec![names::EMANUAL_TESTS]);
    }

    #[test]
    fn seeds_follow_configuration() {
        let catalog = Catalog::standard(&SeedsConfig::none());
        assert!(catalog.iter().all(|d| d.seeds.is_empty()));

        let catalog = Catalog::standard(&SeedsConfig::default());
        let seeded: Vec<_> = catalog
            .iter()
            .filter(|d| !d.seeds.is_empty())
            .map(|d| d.name)
            .collect();
        assert_eq!(
            seeded,
            vec![names::SYMPTOM_GROUPS, names::SYMPTOMS, names::CRULES]
        );
    }

    #[test]
    fn seeded_collections_carry_a_unique_natural_key() {
        let catalog = Catalog::standard(&SeedsConfig::default());
        for descriptor in catalog.iter().filter(|d| !d.seeds.is_empty()) {
            assert!(
                descriptor.indexes.iter().any(IndexSpec::is_unique),
                "{} has seeds but no unique index",
                descriptor.name
            );
        }
    }

    #[test]
    fn dependency_must_be_declared_first() {
        let catalog = Catalog::new()
            .with(
                CollectionDescriptor::new(names::CRULES)
                    .seed(RegionScopedContent::county_rules("2.6", "Champaign")),
            )
            .with(CollectionDescriptor::new(names::COUNTIES));
        let err = catalog.validate().unwrap_err();
        assert!(matches!(err, ProvisionError::Catalog(_)), "{err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let catalog = Catalog::new()
            .with(CollectionDescriptor::new("configs"))
            .with(CollectionDescriptor::new("configs"));
        assert!(matches!(
            catalog.validate(),
            Err(ProvisionError::Catalog(_))
        ));
    }

    #[test]
    fn bad_names_are_rejected() {
        let catalog = Catalog::new().with(CollectionDescriptor::new("bad name"));
        assert!(matches!(
            catalog.validate(),
            Err(ProvisionError::InvalidName { .. })
        ));

        let catalog = Catalog::new()
            .with(CollectionDescriptor::new("users").index(IndexSpec::ascending("a b")));
        assert!(matches!(
            catalog.validate(),
            Err(ProvisionError::InvalidName { .. })
        ));
    }
}
