use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::value::Value;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers
    NumberTime,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::NumberTime),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date/time patterns.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, _) => Self::NumberTime,
            (false, false, _) => Self::Number,
        }
    }
}

/// Represents a single cell in a spreadsheet with position, type, and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the sheet XML
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts the raw cell into a typed value, resolving shared strings.
    /// Values that do not parse as their declared type fall back to text.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> Value {
        let fallback = || Value::Text(self.value.to_owned());
        match self.kind {
            CellType::Empty => Value::Empty,
            CellType::Boolean => Value::Bool(self.value == "1"),
            CellType::Number => self.value.parse::<f64>().map(Value::Number).unwrap_or_else(|_| fallback()),
            CellType::NumberDate1900 | CellType::NumberDate1904 => {
                let is_1904 = self.kind == CellType::NumberDate1904;
                self.value.parse::<f64>().ok()
                    .and_then(|serial| to_datetime(serial, is_1904))
                    .map(|datetime| Value::Date(datetime.date()))
                    .unwrap_or_else(fallback)
            }
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => {
                let is_1904 = self.kind == CellType::NumberDateTime1904;
                self.value.parse::<f64>().ok()
                    .and_then(|serial| to_datetime(serial, is_1904))
                    .map(Value::DateTime)
                    .unwrap_or_else(fallback)
            }
            CellType::NumberTime => self.value.parse::<f64>().ok()
                .and_then(to_time)
                .map(|time| Value::Text(time.format("%H:%M:%S").to_string()))
                .unwrap_or_else(fallback),
            CellType::IsoDateTime => {
                if let Ok(datetime) = NaiveDateTime::parse_from_str(&self.value, "%Y-%m-%dT%H:%M:%S%.f") {
                    Value::DateTime(datetime)
                } else if let Ok(date) = NaiveDate::parse_from_str(&self.value, "%Y-%m-%d") {
                    Value::Date(date)
                } else {
                    fallback()
                }
            }
            CellType::InlineString => fallback(),
            CellType::SharedString => self.value.parse::<usize>().ok()
                .and_then(|index| shared_strings.get(index))
                .map(|string| Value::Text(string.to_owned()))
                .unwrap_or(Value::Empty),
            CellType::Error => Value::Empty,
        }
    }
}

/// Converts an Excel serial number to a datetime.
/// Handles the Lotus 1-2-3 leap year bug for the 1900 epoch.
fn to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)? + Duration::days(days + offset);
    let time = to_time(serial.fract())?;
    Some(date.and_time(time))
}

/// Converts the fractional part of an Excel serial number to a time of day.
fn to_time(fraction: f64) -> Option<NaiveTime> {
    let milliseconds = (fraction.fract() * 86_400_000f64).round() as i64;
    let (time, _) = NaiveTime::from_hms_opt(0, 0, 0)?.overflowing_add_signed(Duration::milliseconds(milliseconds));
    Some(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    #[test]
    fn custom_formats_detect_dates() {
        assert_eq!(CellType::parse_custom_number_format("dd/mm/yyyy", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("\"days\" 0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]#,##0", false), CellType::Number);
    }

    #[test]
    fn serial_dates_convert() {
        let value = cell(CellType::NumberDate1900, "45658").to_value(&[]);
        assert_eq!(value, Value::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn shared_strings_resolve() {
        let shared = vec!["uno".to_owned(), "dos".to_owned()];
        assert_eq!(cell(CellType::SharedString, "1").to_value(&shared), Value::from("dos"));
        assert_eq!(cell(CellType::SharedString, "9").to_value(&shared), Value::Empty);
        assert_eq!(cell(CellType::Number, "x1").to_value(&shared), Value::from("x1"));
    }
}
