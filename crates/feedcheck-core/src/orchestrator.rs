use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::feed_catalog::{FeedCatalog, FeedSourceRef, NamespaceKind};
use crate::introspect::{DdlExecutor, SchemaIntrospector};
use crate::reconcile::{
    ChangeKind, NamespaceCache, NamespaceCheck, NamespaceTarget, SchemaReconciler, UpgradeOutcome,
};

/// Introspection of one namespace failed; the rest of the batch carried on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceFailure {
    pub namespace: String,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingSummary {
    pub namespaces_checked: usize,
    pub orphan_namespaces: usize,
    pub failed_namespaces: usize,
    pub tables_to_create: usize,
    pub tables_to_alter: usize,
    pub columns_to_add: usize,
    pub columns_to_retype: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub checks: Vec<Arc<NamespaceCheck>>,
    pub failures: Vec<NamespaceFailure>,
}

impl ReconciliationReport {
    pub fn summary(&self) -> PendingSummary {
        let mut summary = PendingSummary {
            namespaces_checked: self.checks.len(),
            failed_namespaces: self.failures.len(),
            ..Default::default()
        };
        for check in &self.checks {
            if check.is_orphan {
                summary.orphan_namespaces += 1;
                continue;
            }
            summary.tables_to_create += check.missing_tables.len();
            for table in check.tables_with_column_issues() {
                summary.tables_to_alter += 1;
                summary.columns_to_add += table.missing_columns().len();
                summary.columns_to_retype += table.mismatched_type_columns().len();
            }
        }
        summary
    }

    /// Human-readable list of the DDL each non-orphan namespace needs.
    pub fn change_log(&self) -> String {
        let mut log = String::from("-- Overview of changes that should be performed:\n");
        for check in self.checks.iter().filter(|check| !check.is_orphan) {
            let _ = writeln!(log, "-- {}", check.header_text());
            for statement in check.pending_statements() {
                let _ = writeln!(log, "{}", statement.sql);
            }
        }
        log.push_str("-- End of changes\n");
        log
    }

    pub fn pending_count(&self, kind: ChangeKind) -> usize {
        self.checks
            .iter()
            .flat_map(|check| check.pending_statements())
            .filter(|statement| statement.kind == kind)
            .count()
    }
}

/// Enumerates the namespaces referenced from `catalog` for the requested
/// kinds. Versions and snapshots without a namespace are skipped.
pub fn collect_targets(
    catalog: &dyn FeedCatalog,
    kinds: &[NamespaceKind],
) -> Result<Vec<NamespaceTarget>> {
    let mut targets = Vec::new();

    for project in catalog.projects()? {
        info!(project = %project.name, "Project");
        for source in project.feed_sources {
            info!(feed_source = %source.name, id = %source.id, "Feed source");
            let owner = FeedSourceRef {
                id: source.id.clone(),
                name: source.name.clone(),
                project: project.name.clone(),
            };

            if kinds.contains(&NamespaceKind::Editor) {
                if let Some(namespace) = source.editor_namespace.filter(|ns| !ns.is_empty()) {
                    targets.push(NamespaceTarget {
                        namespace,
                        owner: owner.clone(),
                        label: "editor".to_string(),
                    });
                }
            }

            if kinds.contains(&NamespaceKind::Versions) {
                let total = source.versions.len();
                let with_namespace: Vec<_> = source
                    .versions
                    .into_iter()
                    .filter_map(|version| {
                        let namespace = version.namespace.filter(|ns| !ns.is_empty())?;
                        Some((version.version, namespace))
                    })
                    .collect();
                info!(
                    "Feed versions ({}/{} with valid namespace)",
                    with_namespace.len(),
                    total
                );
                for (version, namespace) in with_namespace {
                    targets.push(NamespaceTarget {
                        namespace,
                        owner: owner.clone(),
                        label: format!("v{version}"),
                    });
                }
            }

            if kinds.contains(&NamespaceKind::Snapshots) {
                let total = source.snapshots.len();
                let with_namespace: Vec<_> = source
                    .snapshots
                    .into_iter()
                    .filter_map(|snapshot| {
                        let namespace = snapshot.namespace.filter(|ns| !ns.is_empty())?;
                        Some((snapshot.name, namespace))
                    })
                    .collect();
                info!(
                    "Snapshots ({}/{} with valid namespace)",
                    with_namespace.len(),
                    total
                );
                for (name, namespace) in with_namespace {
                    targets.push(NamespaceTarget {
                        namespace,
                        owner: owner.clone(),
                        label: name.unwrap_or_else(|| "(unnamed)".to_string()),
                    });
                }
            }
        }
    }

    Ok(targets)
}

/// Checks every namespace referenced from `catalog`. The cache is reset
/// first, so each namespace is introspected at most once per call. A failure
/// on one namespace is recorded and does not stop the others.
pub async fn check_referenced_namespaces<S: SchemaIntrospector>(
    reconciler: &mut SchemaReconciler<S>,
    cache: &mut NamespaceCache,
    catalog: &dyn FeedCatalog,
    kinds: &[NamespaceKind],
) -> Result<ReconciliationReport> {
    cache.reset();
    let targets = collect_targets(catalog, kinds)?;

    let mut failures: Vec<NamespaceFailure> = Vec::new();
    for target in &targets {
        if failures.iter().any(|f| f.namespace == target.namespace) {
            continue;
        }
        if let Err(err) = reconciler.check_namespace(cache, target).await {
            warn!(namespace = %target.namespace, error = %err, "Namespace check failed");
            failures.push(NamespaceFailure {
                namespace: target.namespace.clone(),
                label: target.label.clone(),
                message: err.to_string(),
            });
        }
    }

    let report = ReconciliationReport {
        checks: cache.checks(),
        failures,
    };
    info!("{}", report.change_log());
    Ok(report)
}

/// Upgrades every non-orphan namespace in the report that needs it.
pub async fn upgrade_all<S: DdlExecutor>(
    reconciler: &mut SchemaReconciler<S>,
    report: &ReconciliationReport,
) -> Vec<UpgradeOutcome> {
    let mut outcomes = Vec::new();
    for check in &report.checks {
        if !check.needs_upgrade() {
            continue;
        }
        outcomes.push(reconciler.apply_upgrade(check).await);
    }
    outcomes
}
