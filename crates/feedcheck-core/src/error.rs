// crates/feedcheck-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid {what} JSON: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid expected table catalog: {0}")]
    Catalog(String),

    #[error("DATABASE_URL (or FEEDCHECK_DATABASE_URL) must be set")]
    MissingDatabaseUrl,

    #[error("Feed catalog is not configured (set schema.feed_catalog)")]
    MissingFeedCatalog,
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
