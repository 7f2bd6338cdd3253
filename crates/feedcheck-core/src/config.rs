use std::env;
use std::path::{Path, PathBuf};

use feedcheck_gtfsplus::TableFormat;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ReconcileError, Result};
use crate::expected::ExpectedCatalog;
use crate::feed_catalog::{JsonFeedCatalog, NamespaceKind};
use crate::sql_types::TypeComparison;

pub const DEFAULT_CONFIG_PATH: &str = "feedcheck.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub gtfsplus: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self { gtfsplus: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GtfsPlusSettings {
    pub spec_path: Option<PathBuf>,
    #[serde(flatten)]
    pub format: TableFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    pub namespace_kinds: Vec<NamespaceKind>,
    pub type_comparison: TypeComparison,
    /// JSON table catalog; the built-in GTFS catalog when unset.
    pub expected_tables: Option<PathBuf>,
    pub feed_catalog: Option<PathBuf>,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            namespace_kinds: NamespaceKind::ALL.to_vec(),
            type_comparison: TypeComparison::default(),
            expected_tables: None,
            feed_catalog: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub modules: ModuleSettings,
    pub gtfsplus: GtfsPlusSettings,
    pub schema: SchemaSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            modules: ModuleSettings::default(),
            gtfsplus: GtfsPlusSettings::default(),
            schema: SchemaSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from `feedcheck.toml` when it exists.
    /// `DATABASE_URL` / `FEEDCHECK_DATABASE_URL` override the file's URL.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        if let Some(url) = env::var("DATABASE_URL")
            .or_else(|_| env::var("FEEDCHECK_DATABASE_URL"))
            .ok()
        {
            settings.database_url = Some(url);
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ReconcileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text).map_err(|source| ReconcileError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ReconcileError::MissingDatabaseUrl)
    }

    pub fn expected_catalog(&self) -> Result<ExpectedCatalog> {
        match &self.schema.expected_tables {
            Some(path) => ExpectedCatalog::from_path(path),
            None => ExpectedCatalog::builtin_gtfs(),
        }
    }

    pub fn feed_catalog(&self) -> Result<JsonFeedCatalog> {
        let path = self
            .schema
            .feed_catalog
            .as_ref()
            .ok_or(ReconcileError::MissingFeedCatalog)?;
        JsonFeedCatalog::from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcheck_gtfsplus::TextEncoding;

    #[test]
    fn defaults_apply_to_empty_file() {
        let settings = Settings::from_toml_str("").unwrap();
        assert!(settings.modules.gtfsplus);
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.gtfsplus.format, TableFormat::default());
        assert_eq!(settings.schema.namespace_kinds, NamespaceKind::ALL.to_vec());
        assert_eq!(settings.schema.type_comparison, TypeComparison::Canonical);
    }

    #[test]
    fn sections_are_parsed() {
        let settings = Settings::from_toml_str(
            r#"
            database_url = "postgres://localhost/feeds"

            [modules]
            gtfsplus = false

            [gtfsplus]
            spec_path = "config/gtfsplus.json"
            delimiter = "|"
            encoding = "latin1"

            [schema]
            namespace_kinds = ["editor", "snapshots"]
            type_comparison = "exact"
            feed_catalog = "catalog.json"
            "#,
        )
        .unwrap();

        assert!(!settings.modules.gtfsplus);
        assert_eq!(settings.database_url().unwrap(), "postgres://localhost/feeds");
        assert_eq!(settings.gtfsplus.format.delimiter, b'|');
        assert_eq!(settings.gtfsplus.format.encoding, TextEncoding::Latin1);
        assert_eq!(
            settings.gtfsplus.spec_path.as_deref(),
            Some(Path::new("config/gtfsplus.json"))
        );
        assert_eq!(
            settings.schema.namespace_kinds,
            vec![NamespaceKind::Editor, NamespaceKind::Snapshots]
        );
        assert_eq!(settings.schema.type_comparison, TypeComparison::Exact);
    }

    #[test]
    fn multi_character_delimiter_is_rejected() {
        let err = Settings::from_toml_str("[gtfsplus]\ndelimiter = \",,\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn catalogs_resolve_from_settings_paths() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.json");
        std::fs::write(&catalog_path, r#"{"projects": []}"#).unwrap();
        let config_path = dir.path().join("feedcheck.toml");
        std::fs::write(
            &config_path,
            format!("[schema]\nfeed_catalog = {:?}\n", catalog_path.display().to_string()),
        )
        .unwrap();

        let settings = Settings::from_file(&config_path).unwrap();
        assert!(settings.feed_catalog().is_ok());
        assert!(!settings.expected_catalog().unwrap().tables.is_empty());

        let err = Settings::default().feed_catalog().unwrap_err();
        assert!(matches!(err, ReconcileError::MissingFeedCatalog));
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("broken.toml");
        std::fs::write(&config_path, "max_connections = \"many\"\n").unwrap();

        match Settings::from_file(&config_path) {
            Err(ReconcileError::Config { path, .. }) => assert_eq!(path, config_path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let settings = Settings::default();
        assert!(matches!(
            settings.database_url(),
            Err(ReconcileError::MissingDatabaseUrl)
        ));
    }
}
