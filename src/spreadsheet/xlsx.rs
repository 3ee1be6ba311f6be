use crate::error::PropuestaError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELATIONSHIPS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

// styles.xml
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
// sharedStrings.xml and inline strings
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
// workbook.xml
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_WORKBOOK_VIEW: QName = QName(b"workbookView");
const TAG_SHEET: QName = QName(b"sheet");
// sheetN.xml
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Encrypted packages are OLE compound files instead of zip archives.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// An opened `.xlsx` package. Styles and shared strings are loaded up
/// front; worksheets are parsed on demand.
pub struct Workbook<R: Read + Seek> {
    /// Path or label used in messages
    pub name: String,
    zip: ZipArchive<R>,
    /// Cell type per style index
    number_formats: Vec<CellType>,
    /// (sheet name, package path) in tab order
    sheets: Vec<(String, String)>,
    /// Tab selected when the file was last saved
    active: usize,
    shared_strings: Vec<String>,
}

/// What `xl/workbook.xml` says about the sheets.
struct WorkbookPart {
    sheets: Vec<(String, String)>,
    is_1904: bool,
    active: usize,
}

impl Workbook<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PropuestaError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| SpreadsheetError::FileNotFound(path.display().to_string()))?;
        Self::from_reader(&path.display().to_string(), BufReader::new(file))
    }
}

impl<R: Read + Seek> Workbook<R> {
    /// `name` labels the workbook in messages.
    pub fn from_reader(name: &str, mut reader: R) -> Result<Self, PropuestaError> {
        if is_password_protected(&mut reader)? {
            return Err(SpreadsheetError::PasswordProtected(name.to_owned()).into());
        }

        let mut zip = ZipArchive::new(reader)?;
        let workbook = load_workbook(&mut zip)?;
        if workbook.sheets.is_empty() {
            return Err(SpreadsheetError::EmptyWorkbook(name.to_owned()).into());
        }
        let number_formats = load_number_formats(&mut zip, workbook.is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        debug!(workbook = name, sheets = workbook.sheets.len(), shared_strings = shared_strings.len(), "workbook opened");

        Ok(Workbook {
            name: name.to_owned(),
            zip,
            number_formats,
            active: workbook.active.min(workbook.sheets.len() - 1),
            sheets: workbook.sheets,
            shared_strings,
        })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Name of the tab selected when the file was last saved.
    pub fn active_sheet_name(&self) -> String {
        self.sheets[self.active].0.to_owned()
    }

    /// Package path of a sheet, e.g. `xl/worksheets/sheet1.xml`.
    pub(crate) fn sheet_path(&self, sheet_name: &str) -> Option<String> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
    }

    /// Parses one worksheet. Cells without a value and error cells are left out.
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, PropuestaError> {
        let zip_path = self.sheet_path(sheet_name)
            .ok_or_else(|| SpreadsheetError::SheetNotFound(self.name.to_owned(), sheet_name.to_owned()))?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        // position of the next cell when `r` attributes are absent
        let mut next_row = 0usize;
        let mut next_col = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                    next_row = number.saturating_sub(1);
                }
                next_col = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => next_row += 1,
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((next_row, next_col));
                next_col = col + 1;
                kind = event.get_attribute_value("t")?.map(|t| declared_type(&t)).unwrap_or(CellType::Number);
                if kind == CellType::Number {
                    if let Some(style) = event.get_attribute_value("s")?.and_then(|id| id.parse::<usize>().ok()) {
                        kind = self.number_formats.get(style).copied().unwrap_or(CellType::Number);
                    }
                }
                value.clear();
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if kind != CellType::Empty && !value.is_empty() {
                    let cell = Cell { row, col, kind, value: value.to_owned() };
                    if kind == CellType::Error {
                        debug!(sheet = sheet_name, cell = %cell.reference(), value = %value, "error cell read as empty");
                    }
                    sheet.push(row, col, cell.to_value(&self.shared_strings));
                }
                kind = CellType::default();
                value.clear();
            },
        });
        Ok(sheet)
    }
}

/// Maps the `t` attribute of a cell.
fn declared_type(t: &str) -> CellType {
    match t {
        "inlineStr" | "str" => CellType::InlineString,
        "s" => CellType::SharedString,
        "d" => CellType::IsoDateTime,
        "b" => CellType::Boolean,
        "e" => CellType::Error,
        _ => CellType::Number,
    }
}

fn is_password_protected<R: Read + Seek>(reader: &mut R) -> Result<bool, PropuestaError> {
    let mut signature = [0u8; 8];
    let protected = match reader.read_exact(&mut signature) {
        Ok(()) => signature == CFB_SIGNATURE,
        Err(_) => false,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(protected)
}

/// Relationship id to package path, worksheets only.
fn load_relationships<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> Result<HashMap<String, String>, PropuestaError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Relationship targets are relative to `xl/` unless absolute.
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix("/xl/") {
        format!("xl/{stripped}")
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

fn load_workbook<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<WorkbookPart, PropuestaError> {
    let relationships = load_relationships(zip, WORKBOOK_RELATIONSHIPS_PART)?;
    let mut reader = zip.xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PART.to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    let mut active = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id.to_string()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_VIEW => {
            active = event.parse_attribute_value::<usize>("activeTab")?.unwrap_or(0);
        }
    });
    Ok(WorkbookPart { sheets, is_1904, active })
}

/// Cell type implied by each `cellXfs` entry, indexed by style id.
fn load_number_formats<R: Read + Seek>(zip: &mut ZipArchive<R>, is_1904: bool) -> Result<Vec<CellType>, PropuestaError> {
    let mut reader = match zip.xml_reader(STYLES_PART)? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut in_custom_formats = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut in_format_indexes = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(event) if in_custom_formats && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => in_format_indexes = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => in_format_indexes = false,
        Event::Start(event) if in_format_indexes && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_indexes.push(id.to_string());
        }
    });

    Ok(format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect())
}

fn load_shared_strings<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Vec<String>, PropuestaError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader(SHARED_STRINGS_PART)? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`. Phonetic runs are skipped; when
/// `is_text_content` is false only `<t>` children count.
fn read_string_value<B: BufRead>(
    reader: &mut XmlReader<B>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, PropuestaError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
