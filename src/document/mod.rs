//! # Document Module
//!
//! Loads a Word (.docx) package into memory, exposes the body-level tables
//! and paragraphs of `word/document.xml`, applies the edits the batch jobs
//! need, and writes the package back out.

mod node;
mod table;

pub use table::Table;
pub use table::TableMut;

use crate::error::PropuestaError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::find_part;
use crate::helpers::zip::put_part;
use crate::helpers::zip::read_parts;
use crate::helpers::zip::write_parts;
use crate::helpers::zip::Part;
use crate::helpers::xml::XmlReader;
use crate::match_xml_events;
use node::Element;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;
use table::paragraph_text;
use table::set_paragraph_text;
use table::TAG_PARAGRAPH;
use table::TAG_TABLE;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const TAG_BODY: &str = "w:body";
const TAG_STYLE: QName = QName(b"w:style");
const TAG_STYLE_NAME: QName = QName(b"w:name");
const DEFAULT_PARAGRAPH_STYLE: &str = "Normal";

/// Errors raised while loading or saving a Word document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Cannot open document '{0}'")]
    FileNotFound(String),

    #[error("Missing package part '{0}'")]
    MissingPart(String),

    #[error("Invalid document package: {0}")]
    InvalidPackage(String),

    /// The in-memory document is unchanged and can be saved again.
    #[error("Unable to save '{path}' ({reason}). Please close it and try again")]
    PersistenceFailure { path: String, reason: String },
}

/// A body-level paragraph with its resolved style name.
#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub style: String,
}

/// An opened Word document.
#[derive(Debug)]
pub struct Document {
    parts: Vec<Part>,
    root: Element,
    styles: HashMap<String, String>,
}

impl Document {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PropuestaError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|_| DocumentError::FileNotFound(path.display().to_string()))?;
        let document = Self::from_bytes(&bytes).with_prefix(&path.display().to_string())?;
        debug!(path = %path.display(), tables = document.table_count(), "document opened");
        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PropuestaError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|error| DocumentError::InvalidPackage(error.to_string()))?;
        let parts = read_parts(&mut archive)?;
        let main = find_part(&parts, DOCUMENT_PART)
            .ok_or_else(|| DocumentError::MissingPart(DOCUMENT_PART.to_owned()))?;
        let root = Element::parse(&main.data)?;
        if root.child(TAG_BODY).is_none() {
            Err(DocumentError::InvalidPackage(format!("{DOCUMENT_PART} has no body")))?;
        }
        let styles = match find_part(&parts, STYLES_PART) {
            Some(part) => load_style_names(&part.data)?,
            None => HashMap::new(),
        };
        Ok(Self { parts, root, styles })
    }

    fn body(&self) -> &Element {
        // presence checked on load
        self.root.child(TAG_BODY).unwrap_or(&self.root)
    }

    fn body_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut(TAG_BODY)
    }

    pub fn table_count(&self) -> usize {
        self.body().children_named(TAG_TABLE).count()
    }

    /// Body-level tables in document order.
    pub fn tables(&self) -> Vec<Table<'_>> {
        self.body().children_named(TAG_TABLE).map(Table::new).collect()
    }

    /// Mutable access to a table by 0-based index.
    pub fn table_mut(&mut self, index: usize) -> Option<TableMut<'_>> {
        self.body_mut()?
            .elements_mut()
            .filter(|element| element.name == TAG_TABLE)
            .nth(index)
            .map(TableMut::new)
    }

    /// Body-level paragraphs; paragraphs inside tables are not included.
    pub fn paragraphs(&self) -> Vec<Paragraph> {
        self.body()
            .children_named(TAG_PARAGRAPH)
            .map(|paragraph| Paragraph {
                text: paragraph_text(paragraph),
                style: self.style_name(paragraph),
            })
            .collect()
    }

    /// Replaces the text of the body paragraph at `index`. Returns false when out of range.
    pub fn set_paragraph_text(&mut self, index: usize, text: &str) -> bool {
        let paragraph = self.body_mut().and_then(|body| {
            body.elements_mut()
                .filter(|element| element.name == TAG_PARAGRAPH)
                .nth(index)
        });
        match paragraph {
            Some(paragraph) => {
                set_paragraph_text(paragraph, text);
                true
            }
            None => false,
        }
    }

    /// Texts of the paragraphs whose style name starts with `prefix`.
    pub fn headings(&self, prefix: &str) -> Vec<String> {
        self.paragraphs()
            .into_iter()
            .filter(|paragraph| paragraph.style.starts_with(prefix))
            .map(|paragraph| paragraph.text)
            .collect()
    }

    /// The first `limit` rows of every table, cell text trimmed.
    pub fn show_tables(&self, limit: usize) -> Vec<Vec<Vec<String>>> {
        self.tables()
            .iter()
            .map(|table| {
                table
                    .rows()
                    .into_iter()
                    .take(limit)
                    .map(|row| row.iter().map(|cell| cell.trim().to_owned()).collect())
                    .collect()
            })
            .collect()
    }

    /// Serializes the package with the current document body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PropuestaError> {
        let mut parts = self.parts.clone();
        put_part(&mut parts, DOCUMENT_PART, self.root.to_xml()?);
        Ok(write_parts(Cursor::new(Vec::new()), &parts)?.into_inner())
    }

    /// Writes the package to `path`. On failure the document stays as it is
    /// in memory so the caller can retry.
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<(), PropuestaError> {
        let path = path.as_ref();
        let failure = |reason: String| DocumentError::PersistenceFailure {
            path: path.display().to_string(),
            reason,
        };
        let bytes = self.to_bytes().map_err(|error| failure(error.to_string()))?;
        fs::write(path, bytes).map_err(|error| failure(error.to_string()))?;
        info!(path = %path.display(), "document saved");
        Ok(())
    }

    fn style_name(&self, paragraph: &Element) -> String {
        paragraph
            .child("w:pPr")
            .and_then(|properties| properties.child("w:pStyle"))
            .and_then(|style| style.attribute("w:val"))
            .map(|id| self.styles.get(id).cloned().unwrap_or_else(|| id.to_owned()))
            .unwrap_or_else(|| DEFAULT_PARAGRAPH_STYLE.to_owned())
    }
}

/// Path of the populated copy: `Cartas.docx` becomes `Cartas_updated.docx`.
pub fn updated_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let stem = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{stem}_updated.docx"))
}

/// Maps style ids to UI names, e.g. `Heading1` to `Heading 1`.
fn load_style_names(xml: &[u8]) -> Result<HashMap<String, String>, PropuestaError> {
    let mut reader = XmlReader::new(xml);
    let mut styles = HashMap::new();
    let mut current: Option<String> = None;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_STYLE => {
            current = event.get_attribute_value("w:styleId")?.map(|id| id.into_owned());
        }
        Event::End(event) if event.name() == TAG_STYLE => current = None,
        Event::Start(event) if event.name() == TAG_STYLE_NAME => {
            if let (Some(id), Some(name)) = (current.as_ref(), event.get_attribute_value("w:val")?) {
                styles.insert(id.to_owned(), ui_style_name(&name));
            }
        }
    });
    Ok(styles)
}

/// Built-in styles are stored lowercase; Word shows them capitalized.
fn ui_style_name(name: &str) -> String {
    let is_builtin = matches!(name, "caption" | "footer" | "header")
        || name
            .strip_prefix("heading ")
            .map(|level| matches!(level, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9"))
            .unwrap_or(false);
    if !is_builtin {
        return name.to_owned();
    }
    let mut characters = name.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builds minimal .docx packages in memory for tests across the crate.

    use crate::helpers::zip::write_parts;
    use crate::helpers::zip::Part;
    use std::io::Cursor;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style><w:style w:type="paragraph" w:styleId="Ttulo1Car"><w:name w:val="Heading 1 Char"/></w:style></w:styles>"#;

    /// A table as header rows plus data rows, every cell a plain paragraph.
    pub(crate) fn table_xml(rows: &[&[&str]]) -> String {
        let columns = rows.iter().map(|row| row.len()).max().unwrap_or(0);
        let grid: String = (0..columns).map(|_| r#"<w:gridCol w:w="1200"/>"#).collect();
        let body: String = rows
            .iter()
            .map(|row| {
                let cells: String = row
                    .iter()
                    .map(|text| format!("<w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc>", quick_xml::escape::escape(*text)))
                    .collect();
                format!("<w:tr>{cells}</w:tr>")
            })
            .collect();
        format!("<w:tbl><w:tblPr/><w:tblGrid>{grid}</w:tblGrid>{body}</w:tbl>")
    }

    pub(crate) fn paragraph_xml(text: &str, style: Option<&str>) -> String {
        let properties = style
            .map(|style| format!(r#"<w:pPr><w:pStyle w:val="{style}"/></w:pPr>"#))
            .unwrap_or_default();
        format!("<w:p>{properties}<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", quick_xml::escape::escape(text))
    }

    /// Wraps body XML into a .docx package.
    pub(crate) fn docx_bytes(body: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        );
        let parts = vec![
            Part { name: "[Content_Types].xml".into(), data: b"<Types/>".to_vec(), stored: false },
            Part { name: "word/document.xml".into(), data: document.into_bytes(), stored: false },
            Part { name: "word/styles.xml".into(), data: STYLES.as_bytes().to_vec(), stored: false },
        ];
        write_parts(Cursor::new(Vec::new()), &parts).unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<u8> {
        let body = [
            paragraph_xml("Carta de normas", Some("Heading1")),
            table_xml(&[&["PARTIDA", "NORMA"], &["1", "NOM-001"]]),
            paragraph_xml("Monto: {Bianual Máximo}", None),
            paragraph_xml("Anexo técnico", Some("Ttulo1Car")),
            table_xml(&[&["A"], &["1"], &["2"], &["3"], &["4"], &["5"], &["6"]]),
        ]
        .concat();
        docx_bytes(&body)
    }

    #[test]
    fn tables_and_paragraphs_are_listed() -> Result<(), PropuestaError> {
        let document = Document::from_bytes(&sample())?;
        assert_eq!(document.table_count(), 2);
        assert_eq!(document.paragraphs().len(), 3);
        assert_eq!(document.paragraphs()[0].style, "Heading 1");
        assert_eq!(document.paragraphs()[1].style, "Normal");
        assert_eq!(document.headings("Heading 1"), vec!["Carta de normas", "Anexo técnico"]);

        let summary = document.show_tables(5);
        assert_eq!(summary[0], vec![vec!["PARTIDA", "NORMA"], vec!["1", "NOM-001"]]);
        assert_eq!(summary[1].len(), 5);
        Ok(())
    }

    #[test]
    fn edits_survive_a_save() -> Result<(), PropuestaError> {
        let mut document = Document::from_bytes(&sample())?;
        {
            let mut table = document.table_mut(0).unwrap();
            table.truncate_rows(1);
            let row = table.append_row();
            table.set_cell_text(row, 1, "NOM-059");
        }
        assert!(document.set_paragraph_text(1, "Monto: $1.00"));
        assert!(!document.set_paragraph_text(9, "x"));

        let directory = tempfile::tempdir()?;
        let path = directory.path().join("Cartas_updated.docx");
        document.save_as(&path)?;

        let reloaded = Document::open(&path)?;
        assert_eq!(reloaded.tables()[0].rows(), vec![vec!["PARTIDA", "NORMA"], vec!["", "NOM-059"]]);
        assert_eq!(reloaded.paragraphs()[1].text, "Monto: $1.00");
        Ok(())
    }

    #[test]
    fn failed_save_keeps_the_document() -> Result<(), PropuestaError> {
        let mut document = Document::from_bytes(&sample())?;
        document.set_paragraph_text(0, "Editado");
        let directory = tempfile::tempdir()?;
        let blocked = directory.path().join("missing").join("Cartas_updated.docx");

        let error = document.save_as(&blocked).unwrap_err();
        assert!(matches!(error, PropuestaError::DocumentError(DocumentError::PersistenceFailure { .. })));
        assert_eq!(document.paragraphs()[0].text, "Editado");
        document.save_as(directory.path().join("retry.docx"))?;
        Ok(())
    }

    #[test]
    fn updated_path_appends_suffix() {
        assert_eq!(updated_path("/tmp/Cartas.docx"), PathBuf::from("/tmp/Cartas_updated.docx"));
    }

    #[test]
    fn packages_without_document_part_fail() {
        let bytes = crate::spreadsheet::fixtures::workbook_bytes("Core", vec![]);
        let error = Document::from_bytes(&bytes).unwrap_err();
        assert!(matches!(error, PropuestaError::DocumentError(DocumentError::MissingPart(_))));
    }
}
