mod common;

use std::sync::Arc;

use anyhow::Result;
use common::FakeSchema;
use feedcheck_core::expected::{ExpectedCatalog, ExpectedColumn, ExpectedTable};
use feedcheck_core::feed_catalog::FeedSourceRef;
use feedcheck_core::reconcile::{
    ChangeKind, ColumnCheck, NamespaceCache, NamespaceTarget, SchemaReconciler, TableCheck,
};
use feedcheck_core::sql_types::TypeComparison;

fn expected() -> ExpectedCatalog {
    ExpectedCatalog::new(vec![
        ExpectedTable::new(
            "routes",
            vec![
                ExpectedColumn::new("route_id", "varchar"),
                ExpectedColumn::new("route_type", "smallint"),
                ExpectedColumn::new("route_sort_order", "integer"),
            ],
        ),
        ExpectedTable::new(
            "stop_attributes",
            vec![ExpectedColumn::new("stop_id", "text")],
        ),
    ])
    .expect("valid catalog")
}

fn target(namespace: &str) -> NamespaceTarget {
    NamespaceTarget {
        namespace: namespace.to_string(),
        owner: FeedSourceRef {
            id: "fs-1".into(),
            name: "Metro Bus".into(),
            project: "Metro".into(),
        },
        label: "v1".into(),
    }
}

#[tokio::test]
async fn empty_namespace_is_orphan() -> Result<()> {
    let mut reconciler =
        SchemaReconciler::new(FakeSchema::default(), expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("gone")).await?;

    assert!(check.is_orphan);
    assert!(check.missing_tables.is_empty());
    assert!(check.checked_tables.is_empty());
    assert!(check.pending_statements().is_empty());
    assert!(!check.needs_upgrade());
    Ok(())
}

#[tokio::test]
async fn reconciled_namespace_has_no_issues() -> Result<()> {
    let schema = FakeSchema::default()
        .with_table(
            "abc",
            "routes",
            &[
                ("route_id", "character varying"),
                ("route_type", "smallint"),
                ("route_sort_order", "integer"),
                ("legacy_column", "text"),
            ],
        )
        .with_table("abc", "stop_attributes", &[("stop_id", "text")]);
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("abc")).await?;

    assert!(!check.is_orphan);
    assert!(check.missing_tables.is_empty());
    assert_eq!(check.checked_tables.len(), 2);
    assert!(check.checked_tables.iter().all(|t| !t.has_column_issues()));
    assert!(!check.needs_upgrade());
    Ok(())
}

#[tokio::test]
async fn exact_comparison_flags_type_synonyms() -> Result<()> {
    let schema = FakeSchema::default()
        .with_table(
            "abc",
            "routes",
            &[
                ("route_id", "character varying"),
                ("route_type", "smallint"),
                ("route_sort_order", "integer"),
            ],
        )
        .with_table("abc", "stop_attributes", &[("stop_id", "text")]);
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Exact);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("abc")).await?;

    let routes = &check.checked_tables[0];
    assert_eq!(routes.mismatched_type_columns().len(), 1);
    assert_eq!(routes.mismatched_type_columns()[0].observed.name, "route_id");
    Ok(())
}

#[tokio::test]
async fn repeated_checks_use_the_cache() -> Result<()> {
    let schema = FakeSchema::default().with_table("abc", "routes", &[("route_id", "varchar")]);
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let first = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    let queries_after_first = reconciler.store().metadata_queries;
    let second = reconciler.check_namespace(&mut cache, &target("abc")).await?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(reconciler.store().metadata_queries, queries_after_first);
    // one table listing plus one column listing for `routes`
    assert_eq!(queries_after_first, 2);

    cache.reset();
    let third = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(reconciler.store().metadata_queries, 4);
    Ok(())
}

#[tokio::test]
async fn missing_table_produces_single_create() -> Result<()> {
    let schema = FakeSchema::default().with_table(
        "abc",
        "routes",
        &[
            ("route_id", "varchar"),
            ("route_type", "smallint"),
            ("route_sort_order", "integer"),
        ],
    );
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    assert_eq!(check.missing_tables.len(), 1);
    assert_eq!(check.missing_tables[0].name, "stop_attributes");

    let outcome = reconciler.apply_upgrade(&check).await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].kind, ChangeKind::CreateTable);
    assert_eq!(
        reconciler.store().executed,
        vec![r#"CREATE TABLE IF NOT EXISTS "abc"."stop_attributes" ("stop_id" text);"#]
    );
    Ok(())
}

#[tokio::test]
async fn column_issues_produce_one_alter_per_table() -> Result<()> {
    let schema = FakeSchema::default()
        .with_table(
            "abc",
            "routes",
            &[("route_id", "varchar"), ("route_type", "integer")],
        )
        .with_table("abc", "stop_attributes", &[("stop_id", "text")]);
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    let routes = &check.checked_tables[0];
    assert!(routes.has_column_issues());
    assert_eq!(routes.missing_columns()[0].name, "route_sort_order");
    assert_eq!(routes.mismatched_type_columns()[0].observed.sql_type, "integer");

    let outcome = reconciler.apply_upgrade(&check).await;
    assert_eq!(
        reconciler.store().executed,
        vec![concat!(
            r#"ALTER TABLE "abc"."routes" ADD COLUMN IF NOT EXISTS "route_sort_order" integer, "#,
            r#"ALTER COLUMN "route_type" TYPE smallint USING "route_type"::smallint;"#
        )]
    );
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].kind, ChangeKind::AlterTable);
    Ok(())
}

#[tokio::test]
async fn upgrade_is_a_no_op_once_reconciled() -> Result<()> {
    let schema = FakeSchema::default().with_table(
        "abc",
        "routes",
        &[
            ("route_id", "varchar"),
            ("route_type", "smallint"),
            ("route_sort_order", "integer"),
        ],
    );
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    reconciler.apply_upgrade(&check).await;
    assert_eq!(reconciler.store().executed.len(), 1);

    // The fake does not materialize DDL; emulate the created table.
    let mut schema = reconciler.into_store();
    schema = schema.with_table("abc", "stop_attributes", &[("stop_id", "text")]);
    let executed_before = schema.executed.len();
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    cache.reset();

    let recheck = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    let outcome = reconciler.apply_upgrade(&recheck).await;

    assert!(outcome.applied.is_empty());
    assert!(outcome.is_clean());
    assert_eq!(reconciler.store().executed.len(), executed_before);
    Ok(())
}

#[tokio::test]
async fn orphan_namespace_is_never_upgraded() -> Result<()> {
    let mut reconciler =
        SchemaReconciler::new(FakeSchema::default(), expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("gone")).await?;
    let outcome = reconciler.apply_upgrade(&check).await;

    assert!(outcome.skipped_orphan);
    assert!(outcome.applied.is_empty());
    assert!(reconciler.store().executed.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_statement_does_not_stop_other_tables() -> Result<()> {
    let mut schema = FakeSchema::default()
        .with_table("abc", "routes", &[("route_id", "varchar")]);
    schema.failing_statements.push("stop_attributes".into());
    let mut reconciler = SchemaReconciler::new(schema, expected(), TypeComparison::Canonical);
    let mut cache = NamespaceCache::new();

    let check = reconciler.check_namespace(&mut cache, &target("abc")).await?;
    let outcome = reconciler.apply_upgrade(&check).await;

    assert_eq!(outcome.failures.len(), 1);
    let failure = outcome.first_failure().expect("failure recorded");
    assert_eq!(failure.table, "stop_attributes");
    assert!(failure.statement.starts_with("CREATE TABLE"));
    assert!(failure.message.contains("permission denied"));

    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].table, "routes");
    Ok(())
}

#[test]
fn table_check_reports_missing_and_mismatched_columns() {
    let table = ExpectedTable::new(
        "stops",
        vec![
            ExpectedColumn::new("stop_id", "varchar"),
            ExpectedColumn::new("stop_lat", "double precision"),
            ExpectedColumn::new("stop_name", "varchar"),
        ],
    );
    let check = TableCheck::new(
        "abc",
        table,
        vec![
            ColumnCheck::new("stop_id", "character varying"),
            ColumnCheck::new("stop_lat", "text"),
            ColumnCheck::new("extra", "text"),
        ],
        TypeComparison::Canonical,
    );

    let missing: Vec<&str> = check.missing_columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(missing, vec!["stop_name"]);
    let mismatched: Vec<&str> = check
        .mismatched_type_columns()
        .iter()
        .map(|m| m.observed.name.as_str())
        .collect();
    assert_eq!(mismatched, vec!["stop_lat"]);
    assert!(check.has_column_issues());
}
