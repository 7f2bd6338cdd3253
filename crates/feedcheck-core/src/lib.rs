pub mod config;
pub mod db;
pub mod error;
pub mod expected;
pub mod feed_catalog;
pub mod introspect;
pub mod orchestrator;
pub mod reconcile;
pub mod sql_types;
