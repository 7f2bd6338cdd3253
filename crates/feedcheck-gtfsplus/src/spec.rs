//! Typed model of the GTFS+ table specification.
//!
//! The spec document is a JSON array of tables. It is parsed into loosely
//! typed `Raw*` records first and then checked field by field, so a malformed
//! spec is rejected once at load time instead of being re-examined per cell.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, SpecError};
use crate::reference::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The validation rule attached to a field, keyed by its `inputType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Dropdown { options: Vec<DropdownOption> },
    Text { max_length: Option<usize> },
    GtfsReference(EntityKind),
    /// Any other input type (dates, numbers, colors...). Only the
    /// required/empty check applies.
    Unchecked(String),
}

impl FieldKind {
    pub fn input_type(&self) -> &str {
        match self {
            FieldKind::Dropdown { .. } => "DROPDOWN",
            FieldKind::Text { .. } => "TEXT",
            FieldKind::GtfsReference(kind) => kind.input_type(),
            FieldKind::Unchecked(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.input_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, required: bool, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            required,
            kind,
        }
    }

    pub fn text(name: impl Into<String>, required: bool, max_length: Option<usize>) -> Self {
        Self::new(name, required, FieldKind::Text { max_length })
    }

    pub fn dropdown<I, S>(name: impl Into<String>, required: bool, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = values
            .into_iter()
            .map(|value| DropdownOption {
                value: value.into(),
                text: None,
            })
            .collect();
        Self::new(name, required, FieldKind::Dropdown { options })
    }

    pub fn reference(name: impl Into<String>, required: bool, kind: EntityKind) -> Self {
        Self::new(name, required, FieldKind::GtfsReference(kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub id: String,
    /// Archive entry name, e.g. `route_attributes.txt`.
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    /// Builds a table spec, applying the same consistency checks as the JSON
    /// loader.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldSpec>,
    ) -> std::result::Result<Self, SpecError> {
        let table = Self {
            id: id.into(),
            name: name.into(),
            fields,
        };
        table.check()?;
        Ok(table)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn check(&self) -> std::result::Result<(), SpecError> {
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(SpecError::EmptyFieldName {
                    table: self.id.clone(),
                });
            }
            if let FieldKind::Dropdown { options } = &field.kind {
                if options.is_empty() {
                    return Err(SpecError::DropdownWithoutOptions {
                        table: self.id.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// All GTFS+ tables known to the process, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct SpecCatalog {
    tables: Vec<TableSpec>,
    by_entry_name: HashMap<String, usize>,
}

impl SpecCatalog {
    pub fn new(tables: Vec<TableSpec>) -> std::result::Result<Self, SpecError> {
        let mut by_entry_name = HashMap::with_capacity(tables.len());
        for (position, table) in tables.iter().enumerate() {
            if table.id.is_empty() {
                return Err(SpecError::EmptyTableId { position });
            }
            if by_entry_name.insert(table.name.clone(), position).is_some() {
                return Err(SpecError::DuplicateTable {
                    table: table.id.clone(),
                    name: table.name.clone(),
                });
            }
        }
        Ok(Self {
            tables,
            by_entry_name,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawTable> = serde_json::from_str(json)?;
        let tables = raw
            .into_iter()
            .map(TableSpec::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let catalog = Self::new(tables)?;
        debug!(tables = catalog.len(), "Loaded GTFS+ spec");
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Resolves an archive entry name to the table that describes it.
    pub fn table_for_entry(&self, entry_name: &str) -> Option<&TableSpec> {
        self.by_entry_name
            .get(entry_name)
            .map(|&position| &self.tables[position])
    }

    pub fn table_by_id(&self, id: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|table| table.id == id)
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    id: String,
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    name: String,
    #[serde(default)]
    required: bool,
    input_type: String,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    options: Option<Vec<DropdownOption>>,
}

impl TryFrom<RawTable> for TableSpec {
    type Error = SpecError;

    fn try_from(raw: RawTable) -> std::result::Result<Self, Self::Error> {
        let table_id = raw.id;
        let fields = raw
            .fields
            .into_iter()
            .map(|field| field_from_raw(&table_id, field))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        TableSpec::new(table_id, raw.name, fields)
    }
}

fn field_from_raw(table: &str, raw: RawField) -> std::result::Result<FieldSpec, SpecError> {
    let kind = match raw.input_type.as_str() {
        "DROPDOWN" => FieldKind::Dropdown {
            options: raw.options.unwrap_or_default(),
        },
        "TEXT" => FieldKind::Text {
            max_length: raw.max_length,
        },
        other => match EntityKind::from_input_type(other) {
            Some(kind) => FieldKind::GtfsReference(kind),
            None => FieldKind::Unchecked(other.to_string()),
        },
    };

    if raw.max_length.is_some() && !matches!(kind, FieldKind::Text { .. }) {
        return Err(SpecError::MaxLengthOnNonText {
            table: table.to_string(),
            field: raw.name,
            input_type: raw.input_type,
        });
    }

    Ok(FieldSpec::new(raw.name, raw.required, kind))
}
