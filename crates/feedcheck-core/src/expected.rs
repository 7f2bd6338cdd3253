use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

const BUILTIN_GTFS_TABLES: &str = include_str!("../assets/gtfs_tables.json");

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedColumn {
    pub name: String,
    pub sql_type: String,
}

impl ExpectedColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedTable {
    pub name: String,
    pub columns: Vec<ExpectedColumn>,
}

impl ExpectedTable {
    pub fn new(name: impl Into<String>, columns: Vec<ExpectedColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ExpectedColumn> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// The tables every feed namespace is expected to contain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpectedCatalog {
    pub tables: Vec<ExpectedTable>,
}

impl ExpectedCatalog {
    pub fn new(tables: Vec<ExpectedTable>) -> Result<Self> {
        let catalog = Self { tables };
        catalog.check()?;
        Ok(catalog)
    }

    /// The GTFS tables shipped with the crate.
    pub fn builtin_gtfs() -> Result<Self> {
        Self::from_json_str(BUILTIN_GTFS_TABLES)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json).map_err(|source| ReconcileError::Json {
            what: "expected table catalog",
            source,
        })?;
        catalog.check()?;
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ReconcileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn table(&self, name: &str) -> Option<&ExpectedTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    fn check(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(ReconcileError::Catalog(format!(
                    "table '{}' is listed twice",
                    table.name
                )));
            }
            if table.columns.is_empty() {
                return Err(ReconcileError::Catalog(format!(
                    "table '{}' has no columns",
                    table.name
                )));
            }
            let mut columns = HashSet::new();
            for column in &table.columns {
                if !columns.insert(column.name.as_str()) {
                    return Err(ReconcileError::Catalog(format!(
                        "table '{}' lists column '{}' twice",
                        table.name, column.name
                    )));
                }
            }
        }
        Ok(())
    }
}
