//! Spanish cardinal numbers, as written on the amount line of a letter.

const UNITS: [&str; 30] = [
    "cero", "uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve",
    "diez", "once", "doce", "trece", "catorce", "quince", "dieciséis", "diecisiete", "dieciocho", "diecinueve",
    "veinte", "veintiuno", "veintidós", "veintitrés", "veinticuatro", "veinticinco", "veintiséis", "veintisiete", "veintiocho", "veintinueve",
];

const TENS: [&str; 10] = [
    "", "", "", "treinta", "cuarenta", "cincuenta", "sesenta", "setenta", "ochenta", "noventa",
];

const HUNDREDS: [&str; 10] = [
    "", "ciento", "doscientos", "trescientos", "cuatrocientos", "quinientos", "seiscientos", "setecientos", "ochocientos", "novecientos",
];

/// Long-scale names for groups of six digits.
const SCALES: [(&str, &str); 4] = [
    ("", ""),
    ("millón", "millones"),
    ("billón", "billones"),
    ("trillón", "trillones"),
];

/// Spells a non-negative integer in Spanish, e.g. `1234` as
/// `mil doscientos treinta y cuatro`.
pub fn spell(number: u64) -> String {
    if number == 0 {
        return UNITS[0].to_owned();
    }
    let mut groups = Vec::new();
    let mut rest = number;
    while rest > 0 {
        groups.push(rest % 1_000_000);
        rest /= 1_000_000;
    }

    let mut words = Vec::new();
    for (scale, group) in groups.iter().enumerate().rev() {
        match (scale, *group) {
            (_, 0) => (),
            (0, group) => words.push(below_million(group, false)),
            (scale, 1) => words.push(format!("un {}", SCALES[scale].0)),
            (scale, group) => words.push(format!("{} {}", below_million(group, true), SCALES[scale].1)),
        }
    }
    words.join(" ")
}

/// Uppercases the first letter.
pub fn capitalize(text: &str) -> String {
    let mut characters = text.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

/// `apocope` shortens a trailing "uno" to "un" in front of a scale word.
fn below_million(number: u64, apocope: bool) -> String {
    let thousands = number / 1000;
    let rest = number % 1000;
    let mut words = Vec::new();
    match thousands {
        0 => (),
        1 => words.push("mil".to_owned()),
        _ => words.push(format!("{} mil", below_thousand(thousands, true))),
    }
    if rest > 0 {
        words.push(below_thousand(rest, apocope));
    }
    words.join(" ")
}

fn below_thousand(number: u64, apocope: bool) -> String {
    if number == 100 {
        return "cien".to_owned();
    }
    let hundreds = (number / 100) as usize;
    let rest = number % 100;
    let mut words = Vec::new();
    if hundreds > 0 {
        words.push(HUNDREDS[hundreds].to_owned());
    }
    if rest > 0 {
        words.push(below_hundred(rest, apocope));
    }
    words.join(" ")
}

fn below_hundred(number: u64, apocope: bool) -> String {
    let number = number as usize;
    if number < 30 {
        return match number {
            1 if apocope => "un".to_owned(),
            21 if apocope => "veintiún".to_owned(),
            _ => UNITS[number].to_owned(),
        };
    }
    match number % 10 {
        0 => TENS[number / 10].to_owned(),
        1 if apocope => format!("{} y un", TENS[number / 10]),
        unit => format!("{} y {}", TENS[number / 10], UNITS[unit]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn small_numbers() {
        assert_eq!(spell(0), "cero");
        assert_eq!(spell(1), "uno");
        assert_eq!(spell(16), "dieciséis");
        assert_eq!(spell(21), "veintiuno");
        assert_eq!(spell(45), "cuarenta y cinco");
        assert_eq!(spell(100), "cien");
        assert_eq!(spell(101), "ciento uno");
        assert_eq!(spell(999), "novecientos noventa y nueve");
    }

    #[test]
    fn thousands_and_millions() {
        assert_eq!(spell(1234), "mil doscientos treinta y cuatro");
        assert_eq!(spell(1001), "mil uno");
        assert_eq!(spell(21000), "veintiún mil");
        assert_eq!(spell(31000), "treinta y un mil");
        assert_eq!(spell(100_000), "cien mil");
        assert_eq!(spell(201_000), "doscientos un mil");
        assert_eq!(spell(1_000_000), "un millón");
        assert_eq!(spell(1_500_000), "un millón quinientos mil");
        assert_eq!(spell(3_000_000), "tres millones");
        assert_eq!(spell(21_000_000), "veintiún millones");
        assert_eq!(spell(1_000_000_000), "mil millones");
        assert_eq!(spell(2_000_000_000_000), "dos billones");
    }

    #[test]
    fn capitalize_first_letter_only() {
        assert_eq!(capitalize("mil doscientos"), "Mil doscientos");
        assert_eq!(capitalize("último"), "Último");
        assert_eq!(capitalize(""), "");
    }
}
