pub mod archive;
pub mod errors;
pub mod format;
pub mod reference;
pub mod report;
pub mod spec;
mod validate;

pub use archive::{validate_archive, validate_feed, ArchiveValidation, FeedSources};
pub use errors::{GtfsPlusError, Result, SpecError};
pub use format::{TableFormat, TextEncoding};
pub use reference::{EntityKind, GtfsReference, ReferenceDataset};
pub use report::{ValidationIssue, ValidationReport, HEADER_ROW};
pub use spec::{DropdownOption, FieldKind, FieldSpec, SpecCatalog, TableSpec};
pub use validate::validate_table;
