use chrono::{DateTime, Utc};
use serde::Serialize;

/// Row index used for issues that concern the header rather than a data row.
pub const HEADER_ROW: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub table_id: String,
    pub field_name: String,
    pub row_index: i64,
    pub description: String,
}

impl ValidationIssue {
    pub fn new(
        table_id: impl Into<String>,
        field_name: impl Into<String>,
        row_index: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            field_name: field_name.into(),
            row_index,
            description: description.into(),
        }
    }

    pub fn is_header_issue(&self) -> bool {
        self.row_index == HEADER_ROW
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub subject_id: String,
    /// True when the published GTFS archive was validated because no
    /// user-edited GTFS+ data exists.
    pub is_published_snapshot: bool,
    pub last_modified: DateTime<Utc>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(
        subject_id: impl Into<String>,
        is_published_snapshot: bool,
        last_modified: DateTime<Utc>,
        issues: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            is_published_snapshot,
            last_modified,
            issues,
        }
    }

    pub fn issues_for_table<'a>(
        &'a self,
        table_id: &'a str,
    ) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues
            .iter()
            .filter(move |issue| issue.table_id == table_id)
    }
}
