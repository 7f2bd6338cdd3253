use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use zip::ZipArchive;

use crate::errors::{GtfsPlusError, Result};
use crate::format::TableFormat;
use crate::reference::ReferenceDataset;
use crate::report::{ValidationIssue, ValidationReport};
use crate::spec::SpecCatalog;
use crate::validate::validate_table;

#[derive(Debug, Clone, Default)]
pub struct ArchiveValidation {
    pub issues: Vec<ValidationIssue>,
    /// Entries that matched a table in the spec.
    pub tables_found: usize,
    pub tables_total: usize,
}

/// Where the GTFS+ tables for one feed version can be found.
#[derive(Debug, Clone)]
pub struct FeedSources {
    /// The published GTFS archive for the version.
    pub published: PathBuf,
    /// GTFS+ tables saved by a user after publication, if any.
    pub edited: Option<PathBuf>,
}

/// Validates every archive entry whose name matches a table in `catalog`.
/// Entries are visited in archive order; unknown entries are ignored.
pub fn validate_archive<R, D>(
    catalog: &SpecCatalog,
    reader: R,
    reference: &D,
    format: &TableFormat,
) -> Result<ArchiveValidation>
where
    R: Read + Seek,
    D: ReferenceDataset + ?Sized,
{
    let mut archive = ZipArchive::new(reader)?;
    let mut result = ArchiveValidation {
        tables_total: catalog.len(),
        ..Default::default()
    };

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let Some(table) = catalog.table_for_entry(entry.name()) else {
            continue;
        };
        info!(table = %table.name, "Validating GTFS+ table");
        result.tables_found += 1;
        validate_table(table, entry, reference, format, &mut result.issues)?;
    }

    info!(
        "GTFS+ tables found: {}/{}",
        result.tables_found, result.tables_total
    );
    Ok(result)
}

/// Produces the GTFS+ validation report for one feed version.
///
/// User-edited GTFS+ data takes precedence. When there is none the published
/// archive is validated and the report is marked as a published snapshot.
pub fn validate_feed<D: ReferenceDataset + ?Sized>(
    subject_id: &str,
    sources: &FeedSources,
    catalog: &SpecCatalog,
    reference: &D,
    format: &TableFormat,
    gtfsplus_enabled: bool,
) -> Result<ValidationReport> {
    if !gtfsplus_enabled {
        return Err(GtfsPlusError::ModuleDisabled);
    }
    info!(subject = subject_id, "Validating GTFS+");

    let (path, published) = match sources.edited.as_deref().filter(|path| path.is_file()) {
        Some(edited) => {
            info!("Validating user-saved GTFS+ data (unpublished)");
            (edited, false)
        }
        None => {
            warn!("Modified GTFS+ file not found, loading from main version GTFS");
            (sources.published.as_path(), true)
        }
    };

    let file = File::open(path)?;
    let last_modified = modified_at(path);
    let validation = validate_archive(catalog, file, reference, format)?;

    Ok(ValidationReport::new(
        subject_id,
        published,
        last_modified,
        validation.issues,
    ))
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
