//! Compares the tables of a feed namespace with the expected catalog and
//! derives the DDL that brings the namespace up to date.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::expected::{ExpectedCatalog, ExpectedColumn, ExpectedTable};
use crate::feed_catalog::FeedSourceRef;
use crate::introspect::{DdlExecutor, SchemaIntrospector};
use crate::sql_types::TypeComparison;

/// A column as reported by the live schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCheck {
    pub name: String,
    pub sql_type: String,
}

impl ColumnCheck {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMismatch {
    pub observed: ColumnCheck,
    pub expected: ExpectedColumn,
}

/// One expected table that exists in the namespace, with its column
/// differences worked out at construction.
#[derive(Debug, Clone, Serialize)]
pub struct TableCheck {
    pub namespace: String,
    pub expected: ExpectedTable,
    pub observed_columns: Vec<ColumnCheck>,
    missing_columns: Vec<ExpectedColumn>,
    mismatched_type_columns: Vec<ColumnMismatch>,
}

impl TableCheck {
    pub fn new(
        namespace: impl Into<String>,
        expected: ExpectedTable,
        observed_columns: Vec<ColumnCheck>,
        comparison: TypeComparison,
    ) -> Self {
        let observed_names: HashSet<&str> =
            observed_columns.iter().map(|c| c.name.as_str()).collect();

        let missing_columns = expected
            .columns
            .iter()
            .filter(|column| !observed_names.contains(column.name.as_str()))
            .cloned()
            .collect();

        let mismatched_type_columns = observed_columns
            .iter()
            .filter_map(|observed| {
                let expected = expected.column(&observed.name)?;
                (!comparison.same_type(&expected.sql_type, &observed.sql_type)).then(|| {
                    ColumnMismatch {
                        observed: observed.clone(),
                        expected: expected.clone(),
                    }
                })
            })
            .collect();

        Self {
            namespace: namespace.into(),
            expected,
            observed_columns,
            missing_columns,
            mismatched_type_columns,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.expected.name
    }

    pub fn missing_columns(&self) -> &[ExpectedColumn] {
        &self.missing_columns
    }

    pub fn mismatched_type_columns(&self) -> &[ColumnMismatch] {
        &self.mismatched_type_columns
    }

    pub fn has_column_issues(&self) -> bool {
        !self.missing_columns.is_empty() || !self.mismatched_type_columns.is_empty()
    }

    /// A single statement adding the missing columns and retyping the
    /// mismatched ones, or `None` when the table is in order.
    pub fn alter_table_sql(&self) -> Option<String> {
        if !self.has_column_issues() {
            return None;
        }

        let mut clauses = Vec::new();
        for column in &self.missing_columns {
            clauses.push(format!(
                "ADD COLUMN IF NOT EXISTS {} {}",
                quote_ident(&column.name),
                column.sql_type
            ));
        }
        for mismatch in &self.mismatched_type_columns {
            let column = quote_ident(&mismatch.expected.name);
            let sql_type = &mismatch.expected.sql_type;
            clauses.push(format!(
                "ALTER COLUMN {column} TYPE {sql_type} USING {column}::{sql_type}"
            ));
        }

        Some(format!(
            "ALTER TABLE {} {};",
            qualified_name(&self.namespace, &self.expected.name),
            clauses.join(", ")
        ))
    }
}

/// A namespace to check along with the metadata used to describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTarget {
    pub namespace: String,
    pub owner: FeedSourceRef,
    /// `editor`, `v3`, a snapshot name...
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    CreateTable,
    AlterTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingStatement {
    pub table: String,
    pub kind: ChangeKind,
    pub sql: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceCheck {
    pub namespace: String,
    pub owner: FeedSourceRef,
    pub label: String,
    /// The namespace has no tables at all, so it is reported but never
    /// upgraded.
    pub is_orphan: bool,
    pub missing_tables: Vec<ExpectedTable>,
    pub checked_tables: Vec<TableCheck>,
}

impl NamespaceCheck {
    pub fn header_text(&self) -> String {
        format!(
            "{} {} ({}) of project {}, namespace {}",
            self.label, self.owner.name, self.owner.id, self.owner.project, self.namespace
        )
    }

    pub fn tables_with_column_issues(&self) -> impl Iterator<Item = &TableCheck> {
        self.checked_tables
            .iter()
            .filter(|table| table.has_column_issues())
    }

    pub fn needs_upgrade(&self) -> bool {
        !self.is_orphan
            && (!self.missing_tables.is_empty() || self.tables_with_column_issues().next().is_some())
    }

    /// Statements that would reconcile the namespace: creates first, then
    /// one alter per table with column issues. Empty for orphans.
    pub fn pending_statements(&self) -> Vec<PendingStatement> {
        if self.is_orphan {
            return Vec::new();
        }

        let creates = self.missing_tables.iter().map(|table| PendingStatement {
            table: table.name.clone(),
            kind: ChangeKind::CreateTable,
            sql: create_table_sql(&self.namespace, table),
        });
        let alters = self.checked_tables.iter().filter_map(|table| {
            table.alter_table_sql().map(|sql| PendingStatement {
                table: table.table_name().to_string(),
                kind: ChangeKind::AlterTable,
                sql,
            })
        });
        creates.chain(alters).collect()
    }

    fn log_report(&self) {
        if self.is_orphan {
            warn!(
                namespace = %self.namespace,
                label = %self.label,
                feed_source = %self.owner.id,
                "Namespace has no tables (orphan)"
            );
            return;
        }

        info!(
            namespace = %self.namespace,
            label = %self.label,
            feed_source = %self.owner.id,
            missing_tables = self.missing_tables.len(),
            tables_with_column_issues = self.tables_with_column_issues().count(),
            "Checked namespace"
        );
        for table in &self.missing_tables {
            debug!(namespace = %self.namespace, table = %table.name, "Missing table");
        }
        for table in self.tables_with_column_issues() {
            for column in table.missing_columns() {
                debug!(
                    namespace = %self.namespace,
                    table = %table.table_name(),
                    column = %column.name,
                    "Missing column"
                );
            }
            for mismatch in table.mismatched_type_columns() {
                debug!(
                    namespace = %self.namespace,
                    table = %table.table_name(),
                    column = %mismatch.observed.name,
                    observed = %mismatch.observed.sql_type,
                    expected = %mismatch.expected.sql_type,
                    "Column type mismatch"
                );
            }
        }
    }
}

/// Namespace checks made during one reconciliation run, keyed by namespace.
///
/// Mutation requires `&mut`, so there is a single writer at a time; once
/// populated the shared `Arc<NamespaceCheck>` values may be read from
/// anywhere.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    checks: HashMap<String, Arc<NamespaceCheck>>,
    order: Vec<String>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str) -> Option<Arc<NamespaceCheck>> {
        self.checks.get(namespace).cloned()
    }

    fn insert(&mut self, check: Arc<NamespaceCheck>) {
        if self
            .checks
            .insert(check.namespace.clone(), Arc::clone(&check))
            .is_none()
        {
            self.order.push(check.namespace.clone());
        }
    }

    /// Checks in the order they were first made.
    pub fn checks(&self) -> Vec<Arc<NamespaceCheck>> {
        self.order
            .iter()
            .filter_map(|namespace| self.checks.get(namespace).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn reset(&mut self) {
        self.checks.clear();
        self.order.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedChange {
    pub table: String,
    pub kind: ChangeKind,
    pub statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFailure {
    pub namespace: String,
    pub table: String,
    pub statement: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeOutcome {
    pub namespace: String,
    pub skipped_orphan: bool,
    pub applied: Vec<AppliedChange>,
    pub failures: Vec<StatementFailure>,
}

impl UpgradeOutcome {
    pub fn first_failure(&self) -> Option<&StatementFailure> {
        self.failures.first()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Checks namespaces against the expected catalog and applies the resulting
/// DDL through `store`. The store (and any connection it holds) lives as
/// long as the reconciler.
pub struct SchemaReconciler<S> {
    store: S,
    expected: ExpectedCatalog,
    comparison: TypeComparison,
}

impl<S> SchemaReconciler<S> {
    pub fn new(store: S, expected: ExpectedCatalog, comparison: TypeComparison) -> Self {
        Self {
            store,
            expected,
            comparison,
        }
    }

    pub fn expected(&self) -> &ExpectedCatalog {
        &self.expected
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: SchemaIntrospector> SchemaReconciler<S> {
    /// Returns the cached check for `target.namespace` if this run already
    /// made one, otherwise introspects the namespace and caches the result.
    pub async fn check_namespace(
        &mut self,
        cache: &mut NamespaceCache,
        target: &NamespaceTarget,
    ) -> Result<Arc<NamespaceCheck>> {
        if let Some(existing) = cache.get(&target.namespace) {
            debug!(namespace = %target.namespace, "Namespace already checked");
            return Ok(existing);
        }

        let namespace = target.namespace.as_str();
        let observed_tables = self.store.list_tables(namespace).await?;
        let is_orphan = observed_tables.is_empty();

        let mut missing_tables = Vec::new();
        let mut checked_tables = Vec::new();
        if !is_orphan {
            let observed: HashSet<&str> = observed_tables.iter().map(String::as_str).collect();
            for table in &self.expected.tables {
                if !observed.contains(table.name.as_str()) {
                    missing_tables.push(table.clone());
                    continue;
                }
                let columns = self.store.list_columns(namespace, &table.name).await?;
                checked_tables.push(TableCheck::new(
                    namespace,
                    table.clone(),
                    columns,
                    self.comparison,
                ));
            }
        }

        let check = Arc::new(NamespaceCheck {
            namespace: target.namespace.clone(),
            owner: target.owner.clone(),
            label: target.label.clone(),
            is_orphan,
            missing_tables,
            checked_tables,
        });
        check.log_report();
        cache.insert(Arc::clone(&check));
        Ok(check)
    }
}

impl<S: DdlExecutor> SchemaReconciler<S> {
    /// Creates missing tables and alters tables with column issues.
    ///
    /// A failed statement is recorded and the remaining tables are still
    /// processed. Orphan namespaces are never touched.
    pub async fn apply_upgrade(&mut self, check: &NamespaceCheck) -> UpgradeOutcome {
        let mut outcome = UpgradeOutcome {
            namespace: check.namespace.clone(),
            ..Default::default()
        };

        if check.is_orphan {
            warn!(namespace = %check.namespace, "Skipping upgrade of orphan namespace");
            outcome.skipped_orphan = true;
            return outcome;
        }

        for pending in check.pending_statements() {
            info!(namespace = %check.namespace, table = %pending.table, "Executing {}", pending.sql);
            match self.store.execute_ddl(&pending.sql).await {
                Ok(()) => outcome.applied.push(AppliedChange {
                    table: pending.table,
                    kind: pending.kind,
                    statement: pending.sql,
                }),
                Err(err) => {
                    warn!(
                        namespace = %check.namespace,
                        table = %pending.table,
                        error = %err,
                        "Schema upgrade statement failed"
                    );
                    outcome.failures.push(StatementFailure {
                        namespace: check.namespace.clone(),
                        table: pending.table,
                        statement: pending.sql,
                        message: err.to_string(),
                    });
                }
            }
        }

        outcome
    }
}

pub fn create_table_sql(namespace: &str, table: &ExpectedTable) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| format!("{} {}", quote_ident(&column.name), column.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        qualified_name(namespace, &table.name),
        columns
    )
}

fn qualified_name(namespace: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(namespace), quote_ident(table))
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
