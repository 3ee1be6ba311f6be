//! # Spreadsheet Module
//!
//! Reads Excel 2007+ workbooks (.xlsx, .xlsm) straight from their zip
//! package, exposes worksheets as typed cells, and turns them into
//! header-keyed datasets for the batch jobs. Also writes small single-sheet
//! workbooks and patches cell values of an existing template in place.

mod cell;
mod dataset;
mod patch;
pub(crate) mod reference;
mod sheet;
mod value;
mod writer;
mod xlsx;

pub use dataset::Dataset;
pub use dataset::Record;
pub use patch::patch_workbook;
pub use patch::CellUpdate;
pub use sheet::Sheet;
pub use value::Value;
pub use writer::WorkbookWriter;
pub use xlsx::Workbook;

use crate::error::PropuestaError;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading or writing spreadsheet files.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// The workbook file does not exist or cannot be opened
    #[error("Cannot open workbook '{0}'")]
    FileNotFound(String),

    /// A required package part is missing from the zip archive
    #[error("Missing package part '{0}'")]
    FileError(String),

    /// The workbook is wrapped in an encrypted compound file
    #[error("Workbook '{0}' is password protected")]
    PasswordProtected(String),

    /// The workbook lists no worksheets
    #[error("Workbook '{0}' contains no sheets")]
    EmptyWorkbook(String),

    /// Requested sheet not found in workbook
    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFound(String, String),

    /// Sheet has no data to build a dataset from
    #[error("Sheet '{0}' is empty")]
    EmptySheet(String),
}

/// Opens a workbook and reads one sheet, or the active sheet when no name is given.
pub fn read_sheet<P: AsRef<Path>>(path: P, sheet_name: Option<&str>) -> Result<Sheet, PropuestaError> {
    let mut workbook = Workbook::open(path)?;
    let name = match sheet_name {
        Some(name) => name.to_owned(),
        None => workbook.active_sheet_name(),
    };
    workbook.read_sheet(&name)
}

/// Opens a workbook and reads one sheet as a header-keyed dataset.
pub fn read_dataset<P: AsRef<Path>>(path: P, sheet_name: Option<&str>) -> Result<Dataset, PropuestaError> {
    let sheet = read_sheet(path, sheet_name)?;
    Dataset::from_sheet(&sheet)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builds small workbooks in memory for tests across the crate.

    use super::Value;
    use super::WorkbookWriter;
    use std::io::Cursor;

    /// Serializes rows into an .xlsx package with one sheet.
    pub(crate) fn workbook_bytes(sheet_name: &str, rows: Vec<Vec<Value>>) -> Vec<u8> {
        let mut writer = WorkbookWriter::new(sheet_name);
        for row in rows {
            writer.push_row(row);
        }
        writer.write_to(Cursor::new(Vec::new())).unwrap().into_inner()
    }

    /// Shorthand for a text row.
    pub(crate) fn text_row(values: &[&str]) -> Vec<Value> {
        values.iter().map(|value| Value::from(*value)).collect()
    }
}
