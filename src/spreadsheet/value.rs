use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::fmt::Display;

/// A typed spreadsheet value as consumed by the batch jobs.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Empty cells and whitespace-only text count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Number(number) => number.is_nan(),
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) if !number.is_nan() => Some(*number),
            _ => None,
        }
    }

    /// Numeric value of a number cell, or of text that parses as a plain number.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) if !number.is_nan() => Some(*number),
            Value::Text(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(value) => write!(f, "{}", if *value { "True" } else { "False" }),
            Value::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => write!(f, "{}", *number as i64),
            Value::Number(number) => write!(f, "{}", number),
            Value::Text(text) => f.write_str(text),
            Value::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Value::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(Value::Number(12.0).to_string(), "12");
        assert_eq!(Value::Number(12.5).to_string(), "12.5");
        assert_eq!(Value::Empty.to_string(), "");
    }

    #[test]
    fn coercion_accepts_numeric_text_only() {
        assert_eq!(Value::from(" 15.5 ").coerce_number(), Some(15.5));
        assert_eq!(Value::from("n/a").coerce_number(), None);
        assert_eq!(Value::Bool(true).coerce_number(), None);
        assert!(Value::from("   ").is_missing());
    }
}
