mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{TempDb, doc};
use health_model::{County, SymptomGroup, Symptoms};
use health_storage::db::{Collection, Filter, IndexSpec};
use health_storage::error::SeedError;
use health_storage::storage::assets::MemoryAssets;
use health_storage::config::SeedsConfig;
use health_storage::storage::catalog::{Catalog, CollectionDescriptor, names};
use health_storage::storage::provision;
use health_storage::storage::seed::{
    self, DefaultSymptomGroups, RegionScopedContent, SeedContext, SeedOutcome, SeedPolicy,
    VersionedContent,
};
use serde_json::json;
use tokio::sync::Barrier;

fn symptoms_descriptor() -> CollectionDescriptor {
    CollectionDescriptor::new(names::SYMPTOMS).index(IndexSpec::ascending("app_version").unique())
}

fn symptoms_doc(version: &str) -> Symptoms {
    Symptoms {
        id: None,
        app_version: version.to_string(),
        items: "[]".to_string(),
    }
}

#[tokio::test]
async fn seeding_twice_inserts_once() {
    let temp = TempDb::new("seed-twice");
    let db = temp.connect().await;
    let symptoms = provision::ensure(&db, &symptoms_descriptor())
        .await
        .expect("ensure symptoms")
        .typed::<Symptoms>();
    let filter = Filter::eq("app_version", "2.6");

    let first = seed::seed_if_absent(&symptoms, &filter, || async {
        Ok(vec![symptoms_doc("2.6")])
    })
    .await
    .expect("first seed");
    assert_eq!(first, SeedOutcome::Inserted(1));

    let second = seed::seed_if_absent(&symptoms, &filter, || async {
        Err(SeedError::Generator("ran although data is present".into()))
    })
    .await
    .expect("second seed");
    assert_eq!(second, SeedOutcome::AlreadyPresent(1));
    assert_eq!(symptoms.count(&filter).await.expect("count"), 1);
    db.close().await;
}

#[tokio::test]
async fn empty_generator_is_an_error() {
    let temp = TempDb::new("seed-empty");
    let db = temp.connect().await;
    let symptoms = provision::ensure(&db, &symptoms_descriptor())
        .await
        .expect("ensure symptoms")
        .typed::<Symptoms>();

    let err = seed::seed_if_absent(&symptoms, &Filter::all(), || async { Ok(Vec::new()) })
        .await
        .unwrap_err();
    assert!(matches!(err, SeedError::Generator(_)), "{err}");
    db.close().await;
}

#[tokio::test]
async fn concurrent_seeders_produce_one_document() {
    let temp = TempDb::new("seed-race");
    let db = temp.connect().await;
    let symptoms = provision::ensure(&db, &symptoms_descriptor())
        .await
        .expect("ensure symptoms")
        .typed::<Symptoms>();
    let barrier = Arc::new(Barrier::new(2));

    let run = |symptoms: Collection<Symptoms>, barrier: Arc<Barrier>| async move {
        let filter = Filter::eq("app_version", "2.6");
        seed::seed_if_absent(&symptoms, &filter, move || async move {
            // Both seeders have seen an empty lookup before either inserts.
            barrier.wait().await;
            Ok(vec![symptoms_doc("2.6")])
        })
        .await
    };

    let (a, b) = tokio::join!(
        tokio::spawn(run(symptoms.clone(), barrier.clone())),
        tokio::spawn(run(symptoms.clone(), barrier.clone())),
    );
    let results = [a.expect("task a"), b.expect("task b")];

    let inserted = results
        .iter()
        .filter(|r| matches!(r, Ok(SeedOutcome::Inserted(1))))
        .count();
    let duplicates = results
        .iter()
        .filter(|r| r.as_ref().is_err_and(SeedError::is_duplicate_key))
        .count();
    assert_eq!((inserted, duplicates), (1, 1), "{results:?}");
    assert_eq!(symptoms.count(&Filter::all()).await.expect("count"), 1);
    db.close().await;
}

#[tokio::test]
async fn prune_removes_only_matching_documents() {
    let temp = TempDb::new("seed-prune");
    let db = temp.connect().await;
    let tests = provision::ensure(
        &db,
        &CollectionDescriptor::new(names::EMANUAL_TESTS).index(IndexSpec::ascending("status")),
    )
    .await
    .expect("ensure emanualtests");
    let verified = Filter::eq("status", "verified");

    assert_eq!(seed::prune(&tests, &verified).await.expect("empty prune"), 0);

    for i in 0..5 {
        tests
            .insert_one(&doc(json!({"user_id": format!("u{i}"), "status": "verified"})))
            .await
            .expect("insert verified");
    }
    for status in ["unverified", "unverified", "rejected"] {
        tests
            .insert_one(&doc(json!({"user_id": "u9", "status": status})))
            .await
            .expect("insert pending");
    }

    assert_eq!(seed::prune(&tests, &verified).await.expect("prune"), 5);
    assert_eq!(tests.count(&Filter::all()).await.expect("count"), 3);
    assert_eq!(tests.count(&verified).await.expect("count verified"), 0);
    db.close().await;
}

#[tokio::test]
async fn versioned_content_reads_its_asset() {
    let temp = TempDb::new("seed-versioned");
    let db = temp.connect().await;
    let target = provision::ensure(&db, &symptoms_descriptor())
        .await
        .expect("ensure symptoms");
    let assets = MemoryAssets::new().with("symptoms_2.6.json", r#"[{"id":"fever"}]"#);
    let ready = BTreeMap::new();
    let ctx = SeedContext::new(&ready, &assets);

    let policy = VersionedContent::symptoms("2.6");
    assert_eq!(
        policy.apply(&target, &ctx).await.expect("seed"),
        SeedOutcome::Inserted(1)
    );
    assert_eq!(
        policy.apply(&target, &ctx).await.expect("re-seed"),
        SeedOutcome::AlreadyPresent(1)
    );

    let stored = target
        .typed::<Symptoms>()
        .find_one(&Filter::eq("app_version", "2.6"))
        .await
        .expect("find")
        .expect("seeded document");
    assert_eq!(stored.items, r#"[{"id":"fever"}]"#);
    assert!(stored.id.is_some());

    let missing = VersionedContent::symptoms("3.0")
        .apply(&target, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(missing, SeedError::Asset { .. }), "{missing}");
    db.close().await;
}

#[tokio::test]
async fn region_scoped_content_resolves_the_county() {
    let temp = TempDb::new("seed-region");
    let db = temp.connect().await;
    let counties = provision::ensure(&db, &CollectionDescriptor::new(names::COUNTIES))
        .await
        .expect("ensure counties");
    let rules = provision::ensure(&db, &CollectionDescriptor::new(names::CRULES))
        .await
        .expect("ensure crules");
    let assets = MemoryAssets::new().with("rules_2.6.json", "{}");
    let mut ready = BTreeMap::new();
    ready.insert(names::COUNTIES.to_string(), counties.clone());

    let policy = RegionScopedContent::county_rules("2.6", "Champaign");
    let err = policy
        .apply(&rules, &SeedContext::new(&ready, &assets))
        .await
        .unwrap_err();
    assert!(matches!(err, SeedError::MissingDependency { .. }), "{err}");
    assert_eq!(rules.count(&Filter::all()).await.expect("count"), 0);

    counties
        .typed::<County>()
        .insert_one(&County::new("county-champaign", "Champaign"))
        .await
        .expect("insert county");
    assert_eq!(
        policy
            .apply(&rules, &SeedContext::new(&ready, &assets))
            .await
            .expect("seed"),
        SeedOutcome::Inserted(1)
    );
    let seeded = rules
        .count(&Filter::eq("app_version", "2.6").and("county_id", "county-champaign"))
        .await
        .expect("count");
    assert_eq!(seeded, 1);
    db.close().await;
}

#[tokio::test]
async fn region_scoped_content_needs_its_dependency_ready() {
    let temp = TempDb::new("seed-not-ready");
    let db = temp.connect().await;
    let rules = provision::ensure(&db, &CollectionDescriptor::new(names::CRULES))
        .await
        .expect("ensure crules");
    let assets = MemoryAssets::new();
    let ready = BTreeMap::new();

    let err = RegionScopedContent::county_rules("2.6", "Champaign")
        .apply(&rules, &SeedContext::new(&ready, &assets))
        .await
        .unwrap_err();
    assert!(matches!(err, SeedError::DependencyNotReady { .. }), "{err}");
    db.close().await;
}

#[tokio::test]
async fn default_symptom_groups_only_fill_an_empty_collection() {
    let temp = TempDb::new("seed-groups");
    let db = temp.connect().await;
    let groups = provision::ensure(&db, &CollectionDescriptor::new(names::SYMPTOM_GROUPS))
        .await
        .expect("ensure symptomgroups");
    let assets = MemoryAssets::new();
    let ready = BTreeMap::new();
    let ctx = SeedContext::new(&ready, &assets);
    let policy = DefaultSymptomGroups {
        names: vec!["gr1".into(), "gr2".into()],
    };

    assert_eq!(
        policy.apply(&groups, &ctx).await.expect("seed"),
        SeedOutcome::Inserted(2)
    );
    assert_eq!(
        policy.apply(&groups, &ctx).await.expect("re-seed"),
        SeedOutcome::AlreadyPresent(2)
    );
    assert_eq!(groups.count(&Filter::eq("name", "gr2")).await.expect("count"), 1);
    db.close().await;
}

#[tokio::test]
async fn concurrent_default_groups_produce_one_set() {
    let temp = TempDb::new("seed-groups-race");
    let db = temp.connect().await;
    let catalog = Catalog::standard(&SeedsConfig::default());
    let descriptor = catalog
        .iter()
        .find(|d| d.name == names::SYMPTOM_GROUPS)
        .expect("symptomgroups declared");
    let groups = provision::ensure(&db, descriptor)
        .await
        .expect("ensure symptomgroups")
        .typed::<SymptomGroup>();
    let barrier = Arc::new(Barrier::new(2));

    let run = |groups: Collection<SymptomGroup>, barrier: Arc<Barrier>, writer: &'static str| async move {
        seed::seed_if_absent(&groups, &Filter::all(), move || async move {
            barrier.wait().await;
            Ok(["gr1", "gr2"]
                .into_iter()
                .map(|name| SymptomGroup {
                    id: format!("{writer}-{name}"),
                    name: name.to_string(),
                    symptoms: Vec::new(),
                })
                .collect())
        })
        .await
    };

    let (a, b) = tokio::join!(
        tokio::spawn(run(groups.clone(), barrier.clone(), "a")),
        tokio::spawn(run(groups.clone(), barrier.clone(), "b")),
    );
    let results = [a.expect("task a"), b.expect("task b")];

    let inserted = results
        .iter()
        .filter(|r| matches!(r, Ok(SeedOutcome::Inserted(2))))
        .count();
    let duplicates = results
        .iter()
        .filter(|r| r.as_ref().is_err_and(SeedError::is_duplicate_key))
        .count();
    assert_eq!((inserted, duplicates), (1, 1), "{results:?}");
    assert_eq!(groups.count(&Filter::all()).await.expect("count"), 2);
    db.close().await;
}
