//! In-place rewriting of cell values in an existing workbook.
//!
//! The target sheet XML is streamed event by event. Cells named in the
//! update set are replaced (keeping their style), missing cells and rows are
//! inserted in order, and everything else is copied through untouched. The
//! calculation chain is dropped so Excel rebuilds it on open.

use crate::error::PropuestaError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::find_part;
use crate::helpers::zip::put_part;
use crate::helpers::zip::read_parts;
use crate::helpers::zip::write_parts;
use crate::helpers::zip::Part;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::value::Value;
use crate::spreadsheet::writer::write_cell;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Writer;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::io::Write;
use tracing::debug;
use zip::ZipArchive;

const TAG_SHEET_DATA: QName = QName(b"sheetData");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");

const CALC_CHAIN: &str = "xl/calcChain.xml";

/// A new value for one cell, 0-based.
#[derive(Clone, Debug, PartialEq)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: Value,
}

impl CellUpdate {
    pub fn new(row: usize, col: usize, value: Value) -> Self {
        Self { row, col, value }
    }
}

type PendingRows = BTreeMap<usize, BTreeMap<usize, Value>>;

/// Applies cell updates to one sheet of a workbook package and returns the new package.
///
/// `sheet_path` is the package path of the sheet, as given by
/// [`Workbook::sheet_path`](crate::spreadsheet::Workbook).
pub fn patch_workbook(template: &[u8], sheet_path: &str, updates: &[CellUpdate]) -> Result<Vec<u8>, PropuestaError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    let mut parts = read_parts(&mut archive)?;

    let sheet = find_part(&parts, sheet_path)
        .ok_or_else(|| SpreadsheetError::FileError(sheet_path.to_owned()))?;
    let mut pending = PendingRows::new();
    for update in updates {
        pending.entry(update.row).or_default().insert(update.col, update.value.clone());
    }
    let patched = patch_sheet(&sheet.data, pending)?;
    put_part(&mut parts, sheet_path, patched);
    drop_calc_chain(&mut parts)?;
    debug!(sheet = sheet_path, cells = updates.len(), "sheet patched");

    Ok(write_parts(Cursor::new(Vec::new()), &parts)?.into_inner())
}

fn patch_sheet(xml: &[u8], mut pending: PendingRows) -> Result<Vec<u8>, PropuestaError> {
    let mut reader = XmlReader::preserving(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut next_row = 0usize;
    let mut row_cells: Option<BTreeMap<usize, Value>> = None;
    let mut current_row = 0usize;
    let mut next_col = 0usize;
    let mut skipping = false;

    while let Some(event) = reader.next()? {
        match event {
            _ if skipping => {
                if let Event::End(end) = &event {
                    if end.name() == TAG_CELL {
                        skipping = false;
                    }
                }
            }
            Event::Start(start) if start.name() == TAG_ROW => {
                current_row = row_index(&start, next_row)?;
                flush_rows_before(&mut writer, &mut pending, current_row)?;
                row_cells = Some(pending.remove(&current_row).unwrap_or_default());
                next_col = 0;
                writer.write_event(Event::Start(start))?;
            }
            Event::Empty(start) if start.name() == TAG_ROW => {
                current_row = row_index(&start, next_row)?;
                flush_rows_before(&mut writer, &mut pending, current_row)?;
                next_row = current_row + 1;
                match pending.remove(&current_row) {
                    Some(cells) => {
                        let end = BytesEnd::new("row");
                        writer.write_event(Event::Start(start))?;
                        write_cells(&mut writer, current_row, cells)?;
                        writer.write_event(Event::End(end))?;
                    }
                    None => writer.write_event(Event::Empty(start))?,
                }
            }
            Event::End(end) if end.name() == TAG_ROW => {
                if let Some(cells) = row_cells.take() {
                    write_cells(&mut writer, current_row, cells)?;
                }
                next_row = current_row + 1;
                writer.write_event(Event::End(end))?;
            }
            Event::Start(start) if start.name() == TAG_CELL => {
                if replace_cell(&mut writer, &start, current_row, &mut next_col, row_cells.as_mut())? {
                    skipping = true;
                } else {
                    writer.write_event(Event::Start(start))?;
                }
            }
            Event::Empty(start) if start.name() == TAG_CELL => {
                if !replace_cell(&mut writer, &start, current_row, &mut next_col, row_cells.as_mut())? {
                    writer.write_event(Event::Empty(start))?;
                }
            }
            Event::End(end) if end.name() == TAG_SHEET_DATA => {
                flush_rows_before(&mut writer, &mut pending, usize::MAX)?;
                writer.write_event(Event::End(end))?;
            }
            Event::Empty(start) if start.name() == TAG_SHEET_DATA => {
                let end = BytesEnd::new("sheetData");
                writer.write_event(Event::Start(start))?;
                flush_rows_before(&mut writer, &mut pending, usize::MAX)?;
                writer.write_event(Event::End(end))?;
            }
            other => writer.write_event(other)?,
        }
    }
    Ok(writer.into_inner())
}

/// Writes pending cells that sort before this one, then the replacement if
/// the cell itself is pending. Returns true when the original was replaced.
fn replace_cell<W: Write>(
    writer: &mut Writer<W>,
    start: &BytesStart,
    row: usize,
    next_col: &mut usize,
    cells: Option<&mut BTreeMap<usize, Value>>,
) -> Result<bool, PropuestaError> {
    let col = start
        .get_attribute_value("r")?
        .and_then(|reference| reference_to_index(&reference))
        .map(|(_, col)| col)
        .unwrap_or(*next_col);
    *next_col = col + 1;
    let Some(cells) = cells else {
        return Ok(false);
    };

    let later = cells.split_off(&col);
    let earlier = std::mem::replace(cells, later);
    write_cells(writer, row, earlier)?;
    match cells.remove(&col) {
        Some(value) => {
            let style = start.get_attribute_value("s")?.map(|style| style.into_owned());
            write_cell(writer, &index_to_reference(row, col), &value, style.as_deref())?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn row_index(start: &BytesStart, fallback: usize) -> Result<usize, PropuestaError> {
    Ok(start
        .parse_attribute_value::<usize>("r")?
        .filter(|number| *number > 0)
        .map(|number| number - 1)
        .unwrap_or(fallback))
}

/// Writes every pending row that sorts before `row` as a new `<row>` element.
fn flush_rows_before<W: Write>(writer: &mut Writer<W>, pending: &mut PendingRows, row: usize) -> Result<(), PropuestaError> {
    let later = if row == usize::MAX { PendingRows::new() } else { pending.split_off(&row) };
    let earlier = std::mem::replace(pending, later);
    for (index, cells) in earlier {
        let number = (index + 1).to_string();
        writer.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", number.as_str())])))?;
        write_cells(writer, index, cells)?;
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

fn write_cells<W: Write>(writer: &mut Writer<W>, row: usize, cells: BTreeMap<usize, Value>) -> Result<(), PropuestaError> {
    for (col, value) in cells {
        write_cell(writer, &index_to_reference(row, col), &value, None)?;
    }
    Ok(())
}

/// Removes the calculation chain part and every reference to it.
fn drop_calc_chain(parts: &mut Vec<Part>) -> Result<(), PropuestaError> {
    if find_part(parts, CALC_CHAIN).is_none() {
        return Ok(());
    }
    parts.retain(|part| !part.name.eq_ignore_ascii_case(CALC_CHAIN));

    let overrides = Regex::new(r#"<Override[^>]*PartName="/xl/calcChain\.xml"[^>]*/>"#)?;
    let relationships = Regex::new(r#"<Relationship[^>]*Target="(/xl/)?calcChain\.xml"[^>]*/>"#)?;
    for (name, pattern) in [("[Content_Types].xml", &overrides), ("xl/_rels/workbook.xml.rels", &relationships)] {
        if let Some(part) = find_part(parts, name) {
            let text = String::from_utf8(part.data.clone())?;
            let cleaned = pattern.replace_all(&text, "").into_owned();
            put_part(parts, name, cleaned.into_bytes());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixtures::*;
    use crate::spreadsheet::Workbook;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="2"><c r="A2" s="3"><v>1</v></c><c r="C2"><v>3</v></c></row><row r="4"/><row r="5"><c r="B5" t="inlineStr"><is><t>keep &amp; me</t></is></c></row></sheetData></worksheet>"#;

    #[test]
    fn cells_are_replaced_and_inserted_in_order() -> Result<(), PropuestaError> {
        let mut pending = PendingRows::new();
        pending.entry(1).or_default().insert(0, Value::Number(10.0));
        pending.entry(1).or_default().insert(1, Value::from("nuevo"));
        pending.entry(3).or_default().insert(0, Value::Number(4.0));
        pending.entry(7).or_default().insert(2, Value::Number(8.0));
        pending.entry(0).or_default().insert(0, Value::from("encabezado"));

        let patched = String::from_utf8(patch_sheet(SHEET.as_bytes(), pending)?)?;

        assert!(patched.contains(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>encabezado</t></is></c></row><row r="2">"#));
        assert!(patched.contains(r#"<c r="A2" s="3"><v>10</v></c><c r="B2" t="inlineStr"><is><t>nuevo</t></is></c><c r="C2"><v>3</v></c>"#));
        assert!(patched.contains(r#"<row r="4"><c r="A4"><v>4</v></c></row>"#));
        assert!(patched.contains("keep &amp; me"));
        assert!(patched.contains(r#"<row r="8"><c r="C8"><v>8</v></c></row></sheetData>"#));
        Ok(())
    }

    #[test]
    fn patched_workbook_reads_back() -> Result<(), PropuestaError> {
        let template = workbook_bytes("Precios", vec![text_row(&["DESCRIPCION DETALLADA", "IVA"]), text_row(&["Gasas", ""])]);
        let workbook = Workbook::from_reader("template.xlsx", Cursor::new(template.clone()))?;
        let sheet_path = workbook.sheet_path("Precios").unwrap();

        let patched = patch_workbook(&template, &sheet_path, &[CellUpdate::new(1, 1, Value::Number(0.0))])?;
        let mut workbook = Workbook::from_reader("patched.xlsx", Cursor::new(patched))?;
        let sheet = workbook.read_sheet("Precios")?;
        assert_eq!(sheet.get(1, 0), Some(&Value::from("Gasas")));
        assert_eq!(sheet.get(1, 1), Some(&Value::Number(0.0)));
        Ok(())
    }

    #[test]
    fn calc_chain_is_removed() -> Result<(), PropuestaError> {
        let mut parts = vec![
            Part { name: "[Content_Types].xml".into(), data: br#"<Types><Override PartName="/xl/calcChain.xml" ContentType="x"/><Override PartName="/xl/workbook.xml" ContentType="y"/></Types>"#.to_vec(), stored: false },
            Part { name: "xl/_rels/workbook.xml.rels".into(), data: br#"<Relationships><Relationship Id="rId9" Type="t" Target="calcChain.xml"/></Relationships>"#.to_vec(), stored: false },
            Part { name: "xl/calcChain.xml".into(), data: b"<calcChain/>".to_vec(), stored: false },
        ];
        drop_calc_chain(&mut parts)?;

        assert_eq!(parts.len(), 2);
        assert_eq!(String::from_utf8(parts[0].data.clone())?, r#"<Types><Override PartName="/xl/workbook.xml" ContentType="y"/></Types>"#);
        assert_eq!(String::from_utf8(parts[1].data.clone())?, "<Relationships></Relationships>");
        Ok(())
    }
}
