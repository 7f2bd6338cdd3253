use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use zip::ZipArchive;

use crate::errors::{GtfsPlusError, Result};

/// GTFS entities that a GTFS+ field may reference by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Route,
    Stop,
    Trip,
    Fare,
    Service,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Route => "Route",
            EntityKind::Stop => "Stop",
            EntityKind::Trip => "Trip",
            EntityKind::Fare => "Fare",
            EntityKind::Service => "Service",
        }
    }

    pub fn input_type(&self) -> &'static str {
        match self {
            EntityKind::Route => "GTFS_ROUTE",
            EntityKind::Stop => "GTFS_STOP",
            EntityKind::Trip => "GTFS_TRIP",
            EntityKind::Fare => "GTFS_FARE",
            EntityKind::Service => "GTFS_SERVICE",
        }
    }

    pub fn from_input_type(value: &str) -> Option<Self> {
        match value {
            "GTFS_ROUTE" => Some(EntityKind::Route),
            "GTFS_STOP" => Some(EntityKind::Stop),
            "GTFS_TRIP" => Some(EntityKind::Trip),
            "GTFS_FARE" => Some(EntityKind::Fare),
            "GTFS_SERVICE" => Some(EntityKind::Service),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only ID membership checks against a loaded GTFS feed.
pub trait ReferenceDataset {
    fn has_route(&self, id: &str) -> bool;
    fn has_stop(&self, id: &str) -> bool;
    fn has_trip(&self, id: &str) -> bool;
    fn has_fare(&self, id: &str) -> bool;
    fn has_service(&self, id: &str) -> bool;

    fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Route => self.has_route(id),
            EntityKind::Stop => self.has_stop(id),
            EntityKind::Trip => self.has_trip(id),
            EntityKind::Fare => self.has_fare(id),
            EntityKind::Service => self.has_service(id),
        }
    }
}

/// In-memory ID sets materialized from a GTFS archive.
///
/// Loading is the expensive part; keep one instance warm and borrow it for
/// as many validations as needed.
#[derive(Debug, Clone, Default)]
pub struct GtfsReference {
    routes: HashSet<String>,
    stops: HashSet<String>,
    trips: HashSet<String>,
    fares: HashSet<String>,
    services: HashSet<String>,
}

impl GtfsReference {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reference = Self::from_archive(file)?;
        info!(
            path = %path.as_ref().display(),
            routes = reference.routes.len(),
            stops = reference.stops.len(),
            trips = reference.trips.len(),
            "Loaded GTFS reference dataset"
        );
        Ok(reference)
    }

    pub fn from_archive<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut reference = Self {
            routes: read_ids(&mut archive, "routes.txt", "route_id")?,
            stops: read_ids(&mut archive, "stops.txt", "stop_id")?,
            trips: read_ids(&mut archive, "trips.txt", "trip_id")?,
            fares: read_ids(&mut archive, "fare_attributes.txt", "fare_id")?,
            services: read_ids(&mut archive, "calendar.txt", "service_id")?,
        };
        reference
            .services
            .extend(read_ids(&mut archive, "calendar_dates.txt", "service_id")?);
        Ok(reference)
    }

    pub fn with_routes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_stops<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stops.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_trips<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trips.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_fares<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fares.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_services<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(ids.into_iter().map(Into::into));
        self
    }
}

impl ReferenceDataset for GtfsReference {
    fn has_route(&self, id: &str) -> bool {
        self.routes.contains(id)
    }

    fn has_stop(&self, id: &str) -> bool {
        self.stops.contains(id)
    }

    fn has_trip(&self, id: &str) -> bool {
        self.trips.contains(id)
    }

    fn has_fare(&self, id: &str) -> bool {
        self.fares.contains(id)
    }

    fn has_service(&self, id: &str) -> bool {
        self.services.contains(id)
    }
}

/// Collects one ID column of a GTFS file. A file missing from the archive (or
/// lacking the column) yields an empty set.
fn read_ids<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    file: &'static str,
    column: &str,
) -> Result<HashSet<String>> {
    let entry = match archive.by_name(file) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(HashSet::new()),
        Err(err) => return Err(err.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(entry);
    let headers = reader
        .headers()
        .map_err(|source| GtfsPlusError::ReferenceCsv { file, source })?
        .clone();
    let Some(position) = headers
        .iter()
        .position(|header| header.trim_start_matches('\u{feff}') == column)
    else {
        return Ok(HashSet::new());
    };

    let mut ids = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(|source| GtfsPlusError::ReferenceCsv { file, source })?;
        if let Some(id) = record.get(position) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}
