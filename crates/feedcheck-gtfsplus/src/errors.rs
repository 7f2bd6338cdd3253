use thiserror::Error;

/// Problems with the GTFS+ table specification itself. These are raised while
/// the spec document is loaded and never surface as data issues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("table at position {position} has an empty id")]
    EmptyTableId { position: usize },

    #[error("table '{table}' is declared more than once (entry name '{name}')")]
    DuplicateTable { table: String, name: String },

    #[error("table '{table}' has a field with an empty name")]
    EmptyFieldName { table: String },

    #[error("table '{table}' field '{field}' is a DROPDOWN without options")]
    DropdownWithoutOptions { table: String, field: String },

    #[error("table '{table}' field '{field}' sets maxLength but is of type {input_type}")]
    MaxLengthOnNonText {
        table: String,
        field: String,
        input_type: String,
    },
}

#[derive(Debug, Error)]
pub enum GtfsPlusError {
    #[error("GTFS+ spec is invalid: {0}")]
    Spec(#[from] SpecError),

    #[error("GTFS+ spec JSON could not be read: {0}")]
    SpecJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error in table '{table}': {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error reading GTFS reference file '{file}': {source}")]
    ReferenceCsv {
        file: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("GTFS+ module must be enabled to run GTFS+ validation")]
    ModuleDisabled,
}

pub type Result<T> = std::result::Result<T, GtfsPlusError>;
