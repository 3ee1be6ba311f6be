//! # Table Populator
//!
//! Fills one table of a Word document from dataset rows according to a
//! [`TableSpec`]: checks the table, header row, headers and source columns,
//! replaces the data rows, and when totals are requested substitutes the
//! `{header}` placeholders in the body text and appends the summary rows.
//!
//! Every check runs before the first edit, so a failed call leaves the
//! document untouched.

mod convert;
mod spec;
mod words;

pub use convert::amount_in_words;
pub use convert::format_currency;
pub use convert::format_number;
pub use convert::normalize_header;
pub use convert::render;
pub use spec::FieldKind;
pub use spec::FieldSpec;
pub use spec::RowFilter;
pub use spec::TableSpec;
pub use words::capitalize;
pub use words::spell;

use crate::document::Document;
use crate::spreadsheet::Dataset;
use convert::total_contribution;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Labels of the rows appended after the data when totals are requested.
pub const SUMMARY_LABELS: [&str; 3] = ["SUBTOTAL", "IVA", "GRAN TOTAL"];

/// Content of the tax cells in the summary rows.
pub const IVA_TEXT: &str = "0.00";

#[derive(Error, Debug, PartialEq)]
pub enum PopulateError {
    #[error("Table number {index} does not exist in the document ({count} tables)")]
    InvalidTableIndex { index: usize, count: usize },

    #[error("Header row {row} does not exist in table {table} ({rows} rows)")]
    InvalidHeaderRow { table: usize, row: usize, rows: usize },

    #[error("Missing headers in table {table}: {missing:?}")]
    HeaderMismatch { table: usize, missing: Vec<String> },

    #[error("Missing columns in source data: {missing:?}")]
    MissingSourceColumn { missing: Vec<String> },

    /// The header is not among the expected headers or has no mapped field.
    #[error("Total header '{header}' is not a mapped table header")]
    UnknownTotalHeader { header: String },

    #[error("Table {table} has {columns} columns but {fields} are mapped")]
    TooManyFields { table: usize, fields: usize, columns: usize },

    /// Recovered per cell by writing the raw text.
    #[error("Cannot convert value '{value}'")]
    ValueConversionFailure { value: String },
}

/// Sum of one totaled column.
#[derive(Clone, Debug, PartialEq)]
pub struct Total {
    pub header: String,
    pub field: String,
    /// 0-based table column, the position of `header` among the expected headers
    pub column: usize,
    pub amount: f64,
}

/// A cell written with its raw text because it did not convert.
#[derive(Clone, Debug, PartialEq)]
pub struct RecoveredValue {
    pub row: usize,
    pub field: String,
    pub value: String,
}

/// What a successful call changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopulateReport {
    pub rows: usize,
    pub totals: Vec<Total>,
    pub placeholders: usize,
    pub recovered: Vec<RecoveredValue>,
}

/// Fills table `spec.table` of `document` with `rows` in the order given.
pub fn populate(document: &mut Document, rows: &Dataset, spec: &TableSpec) -> Result<PopulateReport, PopulateError> {
    let totals = validate(document, rows, spec)?;
    let header_row = spec.header_row;
    let table_index = spec.table - 1;
    let mut report = PopulateReport::default();

    let Some(mut table) = document.table_mut(table_index) else {
        return Err(PopulateError::InvalidTableIndex { index: spec.table, count: 0 });
    };
    table.truncate_rows(header_row);

    for (position, record) in rows.records().enumerate() {
        let row = table.append_row();
        for (col, field) in spec.fields.iter().enumerate() {
            let value = record.value(&field.field);
            let text = match convert::render(value, field.kind) {
                Ok(text) => text,
                Err(error) => {
                    let raw = value.to_string().trim().to_owned();
                    warn!(table = spec.table, row = position, field = %field.field, %error, "writing raw value");
                    report.recovered.push(RecoveredValue { row: position, field: field.field.to_owned(), value: raw.clone() });
                    raw
                }
            };
            debug!(field = %field.field, raw = %value, rendered = %text, "cell converted");
            table.set_cell_text(row, col, &text);
        }
        report.rows += 1;
    }

    if spec.total {
        let totals = sum_totals(rows, spec, totals);
        for label in SUMMARY_LABELS {
            let row = table.append_row();
            table.set_cell_text(row, 0, label);
            for total in &totals {
                let text = if label == "IVA" {
                    IVA_TEXT.to_owned()
                } else {
                    format_currency(total.amount)
                };
                table.set_cell_text(row, total.column, &text);
            }
        }
        report.placeholders = substitute_placeholders(document, &totals);
        report.totals = totals;
    }

    info!(table = %spec.label(), rows = report.rows, recovered = report.recovered.len(), "table populated");
    Ok(report)
}

/// Runs every check that can fail; returns the (header, field, column)
/// triples to total.
fn validate(document: &Document, rows: &Dataset, spec: &TableSpec) -> Result<Vec<(String, String, usize)>, PopulateError> {
    let tables = document.tables();
    let count = tables.len();
    if spec.table == 0 || spec.table > count {
        return Err(PopulateError::InvalidTableIndex { index: spec.table, count });
    }
    let table = tables[spec.table - 1];

    let header_cells = match spec.header_row {
        0 => None,
        row => table.row(row - 1),
    }
    .ok_or(PopulateError::InvalidHeaderRow { table: spec.table, row: spec.header_row, rows: table.row_count() })?;

    let normalized: Vec<String> = header_cells.iter().map(|header| normalize_header(header)).collect();
    debug!(table = spec.table, raw = ?header_cells, normalized = ?normalized, expected = ?spec.headers, "comparing headers");
    let missing: Vec<String> = spec
        .headers
        .iter()
        .filter(|header| !normalized.contains(header))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PopulateError::HeaderMismatch { table: spec.table, missing });
    }

    let missing: Vec<String> = spec
        .fields
        .iter()
        .filter(|field| !rows.has_column(&field.field))
        .map(|field| field.field.to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(PopulateError::MissingSourceColumn { missing });
    }

    let mut totals = Vec::new();
    if spec.total {
        for header in &spec.total_headers {
            let column = spec
                .headers
                .iter()
                .position(|expected| expected == header)
                .filter(|column| *column < spec.fields.len())
                .ok_or_else(|| PopulateError::UnknownTotalHeader { header: header.to_owned() })?;
            totals.push((header.to_owned(), spec.fields[column].field.to_owned(), column));
        }
    }

    let columns = table.column_count().max(header_cells.len());
    let widest = totals.iter().map(|(_, _, column)| column + 1).max().unwrap_or(0).max(spec.fields.len());
    if widest > columns {
        return Err(PopulateError::TooManyFields { table: spec.table, fields: widest, columns });
    }
    Ok(totals)
}

fn sum_totals(rows: &Dataset, spec: &TableSpec, totals: Vec<(String, String, usize)>) -> Vec<Total> {
    totals
        .into_iter()
        .map(|(header, field, column)| {
            let mut amount = 0.0;
            for (position, record) in rows.records().enumerate() {
                let value = record.value(&field);
                match total_contribution(value) {
                    Some(number) => amount += number,
                    None if value.is_missing() => (),
                    None => warn!(table = spec.table, row = position, field = %field, value = %value, "non-numeric value counted as zero"),
                }
            }
            debug!(table = spec.table, header = %header, amount, "column total");
            Total { header, field, column, amount }
        })
        .collect()
}

/// Replaces `{header}` in every body paragraph; returns the number of paragraphs changed.
fn substitute_placeholders(document: &mut Document, totals: &[Total]) -> usize {
    let mut changed = 0;
    for (index, paragraph) in document.paragraphs().into_iter().enumerate() {
        let mut text = paragraph.text.clone();
        for total in totals {
            let placeholder = format!("{{{}}}", total.header);
            if text.contains(&placeholder) {
                text = text.replace(&placeholder, &amount_in_words(total.amount));
            }
        }
        if text != paragraph.text && document.set_paragraph_text(index, &text) {
            debug!(paragraph = index, text = %text, "placeholder substituted");
            changed += 1;
        }
    }
    changed
}
