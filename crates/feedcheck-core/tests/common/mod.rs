#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use feedcheck_core::error::{ReconcileError, Result as ReconcileResult};
use feedcheck_core::introspect::{DdlExecutor, SchemaIntrospector};
use feedcheck_core::reconcile::ColumnCheck;

/// In-memory schema catalog that counts metadata queries and records DDL.
#[derive(Default)]
pub struct FakeSchema {
    pub tables: HashMap<String, HashMap<String, Vec<ColumnCheck>>>,
    pub failing_namespaces: HashSet<String>,
    pub failing_statements: Vec<String>,
    pub metadata_queries: usize,
    pub executed: Vec<String>,
}

impl FakeSchema {
    pub fn with_table(mut self, namespace: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        self.tables.entry(namespace.to_string()).or_default().insert(
            table.to_string(),
            columns
                .iter()
                .map(|(name, ty)| ColumnCheck::new(*name, *ty))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl SchemaIntrospector for FakeSchema {
    async fn list_tables(&mut self, namespace: &str) -> ReconcileResult<Vec<String>> {
        self.metadata_queries += 1;
        if self.failing_namespaces.contains(namespace) {
            return Err(ReconcileError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let mut tables: Vec<String> = self
            .tables
            .get(namespace)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        tables.sort();
        Ok(tables)
    }

    async fn list_columns(
        &mut self,
        namespace: &str,
        table: &str,
    ) -> ReconcileResult<Vec<ColumnCheck>> {
        self.metadata_queries += 1;
        Ok(self
            .tables
            .get(namespace)
            .and_then(|tables| tables.get(table))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl DdlExecutor for FakeSchema {
    async fn execute_ddl(&mut self, statement: &str) -> ReconcileResult<()> {
        if self
            .failing_statements
            .iter()
            .any(|needle| statement.contains(needle.as_str()))
        {
            return Err(ReconcileError::Sqlx(sqlx::Error::Protocol(
                "permission denied".into(),
            )));
        }
        self.executed.push(statement.to_string());
        Ok(())
    }
}
