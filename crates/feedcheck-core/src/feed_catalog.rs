//! The project / feed source / version / snapshot metadata that decides
//! which namespaces exist. The catalog itself lives elsewhere; this module
//! only needs to iterate it.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    Editor,
    Versions,
    Snapshots,
}

impl NamespaceKind {
    pub const ALL: [NamespaceKind; 3] = [
        NamespaceKind::Editor,
        NamespaceKind::Versions,
        NamespaceKind::Snapshots,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Editor => "editor",
            NamespaceKind::Versions => "versions",
            NamespaceKind::Snapshots => "snapshots",
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for NamespaceKind {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "editor" => Ok(NamespaceKind::Editor),
            "versions" | "version" => Ok(NamespaceKind::Versions),
            "snapshots" | "snapshot" => Ok(NamespaceKind::Snapshots),
            other => Err(format!("unknown namespace kind '{other}'")),
        }
    }
}

/// The feed source a namespace belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSourceRef {
    pub id: String,
    pub name: String,
    pub project: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedVersionEntry {
    pub version: u32,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSourceEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub editor_namespace: Option<String>,
    #[serde(default)]
    pub versions: Vec<FeedVersionEntry>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub feed_sources: Vec<FeedSourceEntry>,
}

pub trait FeedCatalog {
    fn projects(&self) -> Result<Vec<ProjectEntry>>;
}

/// A feed catalog exported to a JSON file (`{"projects": [...]}`).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonFeedCatalog {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

impl JsonFeedCatalog {
    pub fn new(projects: Vec<ProjectEntry>) -> Self {
        Self { projects }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| ReconcileError::Json {
            what: "feed catalog",
            source,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ReconcileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

impl FeedCatalog for JsonFeedCatalog {
    fn projects(&self) -> Result<Vec<ProjectEntry>> {
        Ok(self.projects.clone())
    }
}
