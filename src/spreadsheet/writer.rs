use crate::error::PropuestaError;
use crate::helpers::zip::write_parts;
use crate::helpers::zip::Part;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::value::Value;
use quick_xml::escape::escape;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use tracing::debug;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

const SPREADSHEET_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Builds a single-sheet workbook row by row.
///
/// Text goes out as inline strings, so no shared string table or styles
/// part is produced; Excel and LibreOffice open the result as is.
#[derive(Debug, Default)]
pub struct WorkbookWriter {
    sheet_name: String,
    rows: Vec<Vec<Value>>,
}

impl WorkbookWriter {
    pub fn new(sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_owned(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    /// Writes the package into any seekable writer and hands the writer back.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, PropuestaError> {
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{SPREADSHEET_NAMESPACE}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            escape(self.sheet_name.as_str())
        );
        let parts = vec![
            part("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
            part("_rels/.rels", ROOT_RELATIONSHIPS.as_bytes().to_vec()),
            part("xl/workbook.xml", workbook.into_bytes()),
            part("xl/_rels/workbook.xml.rels", WORKBOOK_RELATIONSHIPS.as_bytes().to_vec()),
            part("xl/worksheets/sheet1.xml", self.sheet_xml()?),
        ];
        write_parts(writer, &parts)
    }

    /// Writes the workbook to a file, replacing any previous one.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PropuestaError> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))?.flush()?;
        debug!(path = %path.display(), rows = self.rows.len(), "workbook written");
        Ok(())
    }

    fn sheet_xml(&self) -> Result<Vec<u8>, PropuestaError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.write_event(Event::Start(BytesStart::new("worksheet").with_attributes([("xmlns", SPREADSHEET_NAMESPACE)])))?;
        writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
        for (row_index, row) in self.rows.iter().enumerate() {
            let number = (row_index + 1).to_string();
            writer.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", number.as_str())])))?;
            for (col_index, value) in row.iter().enumerate() {
                write_cell(&mut writer, &index_to_reference(row_index, col_index), value, None)?;
            }
            writer.write_event(Event::End(BytesEnd::new("row")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
        writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
        Ok(writer.into_inner())
    }
}

fn part(name: &str, data: Vec<u8>) -> Part {
    Part {
        name: name.to_owned(),
        data,
        stored: false,
    }
}

/// Writes one `<c>` element; empty values write a bare self-closing cell.
/// `style` carries over the `s` attribute of a cell being replaced.
pub(crate) fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    reference: &str,
    value: &Value,
    style: Option<&str>,
) -> Result<(), PropuestaError> {
    let mut start = BytesStart::new("c").with_attributes([("r", reference)]);
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }
    match value {
        Value::Empty => {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        Value::Number(number) if number.is_finite() => {
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "v", &number.to_string())?;
        }
        Value::Bool(flag) => {
            start.push_attribute(("t", "b"));
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "v", if *flag { "1" } else { "0" })?;
        }
        other => {
            start.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let text = other.to_string();
            let mut t = BytesStart::new("t");
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new("t")))?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), PropuestaError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
