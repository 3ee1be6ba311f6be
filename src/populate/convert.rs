use crate::populate::spec::FieldKind;
use crate::populate::words::capitalize;
use crate::populate::words::spell;
use crate::populate::PopulateError;
use crate::spreadsheet::Value;

/// Characters kept in a header besides letters, digits and whitespace.
const HEADER_SYMBOLS: [char; 6] = ['#', '%', '(', ')', '-', '.'];

/// Cleans a header cell for comparison: drops every character that is not a
/// letter, digit, whitespace or one of `# % ( ) - .`, then trims.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|character| {
            character.is_alphanumeric() || character.is_whitespace() || *character == '_' || HEADER_SYMBOLS.contains(character)
        })
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Renders a source value for a cell of the given kind.
///
/// Missing values render empty under every kind. Numeric kinds keep only
/// digits and `.` before parsing. Currency text that still does not parse
/// renders empty; number text that does not parse is a
/// [`PopulateError::ValueConversionFailure`].
pub fn render(value: &Value, kind: FieldKind) -> Result<String, PopulateError> {
    if value.is_missing() {
        return Ok(String::new());
    }
    match kind {
        FieldKind::String => Ok(value.to_string().trim().to_owned()),
        FieldKind::Currency => Ok(parse_sanitized(value).map(format_currency).unwrap_or_default()),
        FieldKind::Number => parse_sanitized(value).map(format_number),
    }
}

fn parse_sanitized(value: &Value) -> Result<f64, PopulateError> {
    let raw = value.to_string();
    let digits: String = raw.chars().filter(|character| character.is_ascii_digit() || *character == '.').collect();
    digits
        .parse::<f64>()
        .map_err(|_| PopulateError::ValueConversionFailure { value: raw.trim().to_owned() })
}

/// `1234.5` as `$1,234.50`.
pub fn format_currency(number: f64) -> String {
    format!("${}", group_thousands(number, ','))
}

/// `1000.0` as `1,000` and `1000.25` as `1,000.25`.
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 {
        let grouped = group_thousands(number, ',');
        grouped.trim_end_matches(".00").to_owned()
    } else {
        group_thousands(number, ',')
    }
}

/// Two-decimal rendering with the integer digits grouped by three.
pub fn group_thousands(number: f64, separator: char) -> String {
    let fixed = format!("{:.2}", number.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3 + 4);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    let sign = if number < 0.0 && fixed.chars().any(|digit| digit != '0' && digit != '.') { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

/// The text that replaces a `{header}` placeholder:
/// `$1 234.56 (Mil doscientos treinta y cuatro pesos 56/100)`.
pub fn amount_in_words(total: f64) -> String {
    let hundredths = (total.abs() * 100.0).round() as u64;
    let words = match spell(hundredths / 100) {
        words if total < 0.0 && hundredths > 0 => format!("menos {words}"),
        words => words,
    };
    format!(
        "${} ({} pesos {:02}/100)",
        group_thousands(total, ' '),
        capitalize(&words),
        hundredths % 100
    )
}

/// Amount a value contributes to a total: numbers as they are, and text that
/// reads as an amount (optional `$`, `,` separators) as its parsed value.
pub fn total_contribution(value: &Value) -> Option<f64> {
    if let Some(number) = value.coerce_number() {
        return Some(number);
    }
    match value {
        Value::Text(text) => {
            let cleaned: String = text
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|character| *character != ',' && !character.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
        }
        _ => None,
    }
}
