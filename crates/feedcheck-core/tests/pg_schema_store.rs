use std::env;

use anyhow::Result;
use feedcheck_core::db;
use feedcheck_core::expected::{ExpectedCatalog, ExpectedColumn, ExpectedTable};
use feedcheck_core::feed_catalog::FeedSourceRef;
use feedcheck_core::introspect::{PgSchemaStore, SchemaIntrospector};
use feedcheck_core::reconcile::{NamespaceCache, NamespaceTarget, SchemaReconciler};
use feedcheck_core::sql_types::TypeComparison;

const NAMESPACE: &str = "feedcheck_store_test";

#[tokio::test]
async fn upgrade_reconciles_a_live_namespace() -> Result<()> {
    let database_url = match env::var("FEEDCHECK_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping live schema store test because FEEDCHECK_TEST_DATABASE_URL is not set"
            );
            return Ok(());
        }
    };

    let pool = db::connect(&database_url, 2).await?;
    sqlx::raw_sql(&format!(
        r#"DROP SCHEMA IF EXISTS "{NAMESPACE}" CASCADE;
           CREATE SCHEMA "{NAMESPACE}";
           CREATE TABLE "{NAMESPACE}"."routes" (route_id varchar, route_type integer);"#
    ))
    .execute(&pool)
    .await?;

    let expected = ExpectedCatalog::new(vec![
        ExpectedTable::new(
            "routes",
            vec![
                ExpectedColumn::new("route_id", "varchar"),
                ExpectedColumn::new("route_type", "smallint"),
                ExpectedColumn::new("route_color", "varchar"),
            ],
        ),
        ExpectedTable::new("trips", vec![ExpectedColumn::new("trip_id", "varchar")]),
    ])?;
    let target = NamespaceTarget {
        namespace: NAMESPACE.to_string(),
        owner: FeedSourceRef {
            id: "fs-test".into(),
            name: "Test Feed".into(),
            project: "Test".into(),
        },
        label: "editor".into(),
    };

    let store = PgSchemaStore::acquire(&pool).await?;
    let mut reconciler = SchemaReconciler::new(store, expected, TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target).await?;
    assert!(!check.is_orphan);
    assert_eq!(check.missing_tables.len(), 1);
    assert_eq!(check.checked_tables[0].missing_columns().len(), 1);
    assert_eq!(check.checked_tables[0].mismatched_type_columns().len(), 1);

    let outcome = reconciler.apply_upgrade(&check).await;
    assert!(outcome.is_clean(), "{:?}", outcome.failures);
    assert_eq!(outcome.applied.len(), 2);

    cache.reset();
    let recheck = reconciler.check_namespace(&mut cache, &target).await?;
    assert!(!recheck.needs_upgrade());

    let mut store = reconciler.into_store();
    let columns = store.list_columns(NAMESPACE, "routes").await?;
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["route_id", "route_type", "route_color"]);
    assert!(store.list_tables("feedcheck_absent_namespace").await?.is_empty());
    drop(store);

    sqlx::raw_sql(&format!(r#"DROP SCHEMA IF EXISTS "{NAMESPACE}" CASCADE;"#))
        .execute(&pool)
        .await?;
    Ok(())
}
