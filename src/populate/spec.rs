use serde::Deserialize;
use serde::Serialize;

/// How a source value is rendered into a table cell.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// `$` plus thousands-grouped amount with two decimals
    Currency,
    /// Thousands-grouped; whole numbers without decimals
    Number,
    /// Trimmed text
    #[default]
    String,
}

/// One table column fed from one dataset column.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FieldSpec {
    pub field: String,
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(field: &str, kind: FieldKind) -> Self {
        Self {
            field: field.to_owned(),
            kind,
        }
    }
}

/// Keeps only the rows whose `column` equals `value`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

/// Declarative description of one table to fill.
///
/// `table` and `header_row` are 1-based. `fields` map positionally onto the
/// table columns; `headers` are the normalized header texts expected in the
/// header row. The two lists need not have the same length.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TableSpec {
    /// Label used in logs and the batch report
    #[serde(default)]
    pub name: String,
    pub table: usize,
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    pub headers: Vec<String>,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub total: bool,
    #[serde(default)]
    pub total_headers: Vec<String>,
    #[serde(default)]
    pub filter: Option<RowFilter>,
}

fn default_header_row() -> usize {
    1
}

impl TableSpec {
    /// Label for messages: the configured name or `table N`.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("table {}", self.table)
        } else {
            format!("{} (table {})", self.name, self.table)
        }
    }
}
