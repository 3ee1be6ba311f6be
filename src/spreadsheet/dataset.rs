use crate::error::PropuestaError;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::value::Value;
use crate::spreadsheet::SpreadsheetError;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Rows of a sheet keyed by the header row.
///
/// Column names are unique: blank headers become `Unnamed: N` and repeated
/// headers get a `.1`, `.2` suffix. Rows never change after loading; filtering
/// and sorting produce new datasets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// A borrowed view of one dataset row.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    /// Value of a named column, `None` for unknown columns.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    /// Value of a named column, empty for unknown columns.
    pub fn value(&self, column: &str) -> &'a Value {
        const EMPTY: &Value = &Value::Empty;
        self.get(column).unwrap_or(EMPTY)
    }
}

impl Dataset {
    /// Builds a dataset from column names and rows; short rows are padded.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = unique_columns(columns);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Uses the first used row of the sheet as header and every later
    /// non-blank row as a record.
    pub fn from_sheet(sheet: &Sheet) -> Result<Self, PropuestaError> {
        let mut grid = sheet.grid().into_iter();
        let header = grid
            .next()
            .ok_or_else(|| SpreadsheetError::EmptySheet(sheet.name.to_owned()))?;
        let columns = header.iter().map(|value| value.to_string().trim().to_owned()).collect();
        let rows = grid
            .filter(|row| row.iter().any(|value| !value.is_missing()))
            .collect();
        Ok(Self::new(columns, rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates the rows in order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// Keeps the rows whose trimmed display text in `column` equals `expected`.
    pub fn filter_eq(&self, column: &str, expected: &str) -> Self {
        let Some(index) = self.column_index(column) else {
            return Self { columns: self.columns.clone(), rows: Vec::new() };
        };
        let rows = self
            .rows
            .iter()
            .filter(|row| row[index].to_string().trim() == expected.trim())
            .cloned()
            .collect();
        Self { columns: self.columns.clone(), rows }
    }

    /// Stable sort on one column: numbers first in numeric order, then other
    /// values by their text, blanks last. Unknown columns leave the order as is.
    pub fn sort_by(&self, column: &str) -> Self {
        let mut rows = self.rows.clone();
        if let Some(index) = self.column_index(column) {
            rows.sort_by(|left, right| compare_values(&left[index], &right[index]));
        }
        Self { columns: self.columns.clone(), rows }
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left.is_missing(), right.is_missing()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => (),
    }
    match (left.as_number(), right.as_number()) {
        (Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.to_string().cmp(&right.to_string()),
    }
}

/// Names blank headers by position and suffixes duplicates.
fn unique_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen = HashMap::<String, usize>::new();
    let mut unique = Vec::with_capacity(columns.len());
    for (index, column) in columns.into_iter().enumerate() {
        let base = if column.is_empty() { format!("Unnamed: {index}") } else { column };
        let mut name = base.clone();
        if let Some(&start) = seen.get(&base) {
            let mut count = start;
            loop {
                count += 1;
                name = format!("{base}.{count}");
                if !seen.contains_key(&name) {
                    break;
                }
            }
            seen.insert(base, count);
        }
        seen.insert(name.clone(), 0);
        unique.push(name);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        Dataset::new(
            vec!["NUMERO DE PARTIDA".into(), "Membrete".into()],
            vec![
                vec![Value::Number(10.0), Value::from("Eseotres")],
                vec![Value::Empty, Value::from("Rafarm")],
                vec![Value::Number(2.0), Value::from("Rafarm ")],
                vec![Value::from("A-1"), Value::from("Eseotres")],
            ],
        )
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let dataset = Dataset::new(
            vec!["Mínimo".into(), "Máximo".into(), "Mínimo".into(), "".into(), "Mínimo".into()],
            vec![vec![Value::Number(1.0)]],
        );
        assert_eq!(dataset.columns(), ["Mínimo", "Máximo", "Mínimo.1", "Unnamed: 3", "Mínimo.2"]);
        assert_eq!(dataset.records().next().map(|record| record.value("Máximo").clone()), Some(Value::Empty));
    }

    #[test]
    fn sort_puts_numbers_first_and_blanks_last() {
        let sorted = dataset().sort_by("NUMERO DE PARTIDA");
        let keys: Vec<String> = sorted.records().map(|record| record.value("NUMERO DE PARTIDA").to_string()).collect();
        assert_eq!(keys, vec!["2", "10", "A-1", ""]);
    }

    #[test]
    fn filter_compares_trimmed_text() {
        let filtered = dataset().filter_eq("Membrete", "Rafarm");
        assert_eq!(filtered.len(), 2);
        assert!(dataset().filter_eq("Falta", "x").is_empty());
    }

    #[test]
    fn from_sheet_skips_blank_rows() -> Result<(), PropuestaError> {
        let mut sheet = Sheet::new("book.xlsx", "Core");
        sheet.push(1, 1, Value::from("Clave"));
        sheet.push(1, 2, Value::from("Norma"));
        sheet.push(2, 1, Value::from("010.000.4413.00"));
        sheet.push(4, 2, Value::from("NOM-059"));

        let dataset = Dataset::from_sheet(&sheet)?;
        assert_eq!(dataset.columns(), ["Clave", "Norma"]);
        assert_eq!(dataset.len(), 2);
        assert!(Dataset::from_sheet(&Sheet::new("book.xlsx", "Vacía")).is_err());
        Ok(())
    }
}
