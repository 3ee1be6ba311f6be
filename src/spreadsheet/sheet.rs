use crate::spreadsheet::value::Value;
use std::collections::HashMap;

/// Represents one worksheet read from a spreadsheet file.
/// Positions are 0-based and absolute (row 0 is Excel row 1).
#[derive(Debug)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// All non-empty cells in reading order
    cells: Vec<(usize, usize, Value)>,
    /// Index mapping from (row, col) to cell vector position
    indexes: HashMap<(usize, usize), usize>,
    /// Actual data range (determined from cell data)
    pub row_lower_bound: Option<usize>,
    pub row_upper_bound: Option<usize>,
    pub col_lower_bound: Option<usize>,
    pub col_upper_bound: Option<usize>,
}

impl Sheet {
    /// Creates an empty sheet.
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            indexes: HashMap::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, updating the data range. Empty values are dropped.
    pub(crate) fn push(&mut self, row: usize, col: usize, value: Value) {
        if value == Value::Empty {
            return;
        }
        self.update_bound(row, col);
        match self.indexes.get(&(row, col)) {
            Some(index) => self.cells[*index].2 = value,
            None => {
                self.indexes.insert((row, col), self.cells.len());
                self.cells.push((row, col, value));
            }
        }
    }

    /// Updates the actual data range boundaries based on cell positions.
    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|lower| row < lower).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|lower| col < lower).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Gets the value at an absolute position.
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.indexes
            .get(&(row, col))
            .and_then(|index| self.cells.get(*index))
            .map(|(_, _, value)| value)
    }

    /// Returns the used range as a dense matrix, missing cells as `Value::Empty`.
    pub fn grid(&self) -> Vec<Vec<Value>> {
        let (Some(row_lower), Some(row_upper), Some(col_lower), Some(col_upper)) =
            (self.row_lower_bound, self.row_upper_bound, self.col_lower_bound, self.col_upper_bound)
        else {
            return Vec::new();
        };
        (row_lower..=row_upper)
            .map(|row| {
                (col_lower..=col_upper)
                    .map(|col| self.get(row, col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Finds the first row after `header_row` whose value in `col` satisfies the predicate.
    pub fn find_row<F>(&self, header_row: usize, col: usize, predicate: F) -> Option<usize>
    where
        F: Fn(&Value) -> bool,
    {
        let upper = self.row_upper_bound?;
        ((header_row + 1)..=upper).find(|row| self.get(*row, col).map(&predicate).unwrap_or(false))
    }
}
