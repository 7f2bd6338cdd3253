use std::io::{BufRead, BufReader, Read};

use tracing::debug;

use crate::errors::{GtfsPlusError, Result};
use crate::format::TableFormat;
use crate::reference::{EntityKind, ReferenceDataset};
use crate::report::{ValidationIssue, HEADER_ROW};
use crate::spec::{DropdownOption, FieldKind, FieldSpec, TableSpec};

const NOT_FOUND: &str = "not found in GTFS";

/// Validates one GTFS+ table file against its spec, appending every issue
/// found to `issues`.
///
/// The first line is the header and is split on plain commas. Every further
/// physical line is one data row, split quote-aware on `format.delimiter`;
/// an unbalanced quote only affects its own line. Row-level problems never
/// stop the scan; only a read failure does, in which case the issues
/// gathered so far remain in `issues`.
///
/// Returns the number of data rows read.
pub fn validate_table<R, D>(
    table: &TableSpec,
    input: R,
    reference: &D,
    format: &TableFormat,
    issues: &mut Vec<ValidationIssue>,
) -> Result<usize>
where
    R: Read,
    D: ReferenceDataset + ?Sized,
{
    let mut input = BufReader::new(input);

    let mut header_line = Vec::new();
    input.read_until(b'\n', &mut header_line)?;
    let header_bytes = trim_line_ending(&header_line);
    let header_bytes = header_bytes
        .strip_prefix(b"\xEF\xBB\xBF")
        .unwrap_or(header_bytes);
    let header = format.encoding.decode(header_bytes);
    let headers: Vec<&str> = header.split(',').collect();

    let bindings = bind_fields(table, &headers, issues);

    let mut rows = csv::ReaderBuilder::new();
    rows.has_headers(false)
        .flexible(true)
        .delimiter(format.delimiter)
        .terminator(csv::Terminator::Any(b'\n'));

    let mut line = Vec::new();
    let mut record = csv::ByteRecord::new();
    let mut row_index: i64 = 0;
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        split_row(&rows, &table.id, trim_line_ending(&line), &mut record)?;

        for (position, raw) in record.iter().enumerate() {
            let Some(Some(field)) = bindings.get(position) else {
                continue;
            };
            let value = format.encoding.decode(raw);
            check_value(issues, &table.id, row_index, &value, field, reference);
        }
        row_index += 1;
    }

    debug!(table = %table.id, rows = row_index, "Validated GTFS+ table");
    Ok(row_index as usize)
}

/// Maps header positions to field specs and reports required fields that
/// have no column.
fn bind_fields<'t>(
    table: &'t TableSpec,
    headers: &[&str],
    issues: &mut Vec<ValidationIssue>,
) -> Vec<Option<&'t FieldSpec>> {
    let mut bindings = vec![None; headers.len()];
    for field in &table.fields {
        match headers.iter().position(|header| *header == field.name) {
            Some(position) => bindings[position] = Some(field),
            None if field.required => issues.push(ValidationIssue::new(
                &table.id,
                &field.name,
                HEADER_ROW,
                "Required column missing.",
            )),
            None => {}
        }
    }
    bindings
}

fn check_value<D: ReferenceDataset + ?Sized>(
    issues: &mut Vec<ValidationIssue>,
    table_id: &str,
    row_index: i64,
    value: &str,
    field: &FieldSpec,
    reference: &D,
) {
    let mut report = |description: String| {
        issues.push(ValidationIssue::new(
            table_id,
            &field.name,
            row_index,
            description,
        ));
    };

    if field.required && value.is_empty() {
        report("Required field missing value".to_string());
    }

    match &field.kind {
        FieldKind::Dropdown { options } => {
            // An empty value is only exempt when the field is optional.
            let exempt = !field.required && value.is_empty();
            if !exempt && !matches_option(options, value) {
                report(format!("Value: {value} is not a valid option."));
            }
        }
        FieldKind::Text {
            max_length: Some(max_length),
        } => {
            if value.chars().count() > *max_length {
                report(format!(
                    "Text value exceeds the max. length of {max_length}"
                ));
            }
        }
        FieldKind::Text { max_length: None } => {}
        FieldKind::GtfsReference(kind) => {
            if !reference.contains(*kind, value) {
                report(missing_id_text(*kind, value));
            }
        }
        FieldKind::Unchecked(_) => {}
    }
}

fn matches_option(options: &[DropdownOption], value: &str) -> bool {
    let value = value.to_lowercase();
    options
        .iter()
        .any(|option| option.value.to_lowercase() == value)
}

fn missing_id_text(kind: EntityKind, value: &str) -> String {
    format!("{} ID {} {}", kind.label(), value, NOT_FOUND)
}

/// Splits one line into `record`. An empty line is a row with a single empty
/// value.
fn split_row(
    rows: &csv::ReaderBuilder,
    table_id: &str,
    line: &[u8],
    record: &mut csv::ByteRecord,
) -> Result<()> {
    record.clear();
    let found = !line.is_empty()
        && rows
            .from_reader(line)
            .read_byte_record(record)
            .map_err(|err| csv_error(table_id, err))?;
    if !found {
        record.clear();
        record.push_field(b"");
    }
    Ok(())
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn csv_error(table_id: &str, err: csv::Error) -> GtfsPlusError {
    if err.is_io_error() {
        return GtfsPlusError::Io(err.into());
    }
    GtfsPlusError::Csv {
        table: table_id.to_string(),
        source: err,
    }
}
