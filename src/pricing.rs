//! Economic-proposal prices for the procurement portal's upload template.
//!
//! Prices come from the source `Core` sheet: one line per item description
//! with a positive maximum quantity and unit price. They are written into
//! the rows of the portal template whose description matches, ignoring case
//! and runs of whitespace.

use crate::error::PropuestaError;
use crate::spreadsheet::patch_workbook;
use crate::spreadsheet::CellUpdate;
use crate::spreadsheet::Dataset;
use crate::spreadsheet::Value;
use crate::spreadsheet::Workbook;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub const DESCRIPTION_COLUMN: &str = "Descripción";
pub const QUANTITY_COLUMN: &str = "Cantidad Máxima";
pub const UNIT_PRICE_COLUMN: &str = "Precio Unitario";

/// Template headers, in the order of [`PriceLine::values`].
pub const PORTAL_HEADERS: [&str; 6] = [
    "DESCRIPCION DETALLADA",
    "PRECIO UNITARIO SIN IMPUESTOS",
    "MONTO DE LA OFERTA SIN IMPUESTOS",
    "IVA",
    "OTROS IMPUESTOS",
    "MONTO TOTAL DE LA OFERTA",
];

/// 1-based row of the template holding [`PORTAL_HEADERS`].
pub const HEADER_ROW: usize = 6;

pub const OUTPUT_FILE_NAME: &str = "P01 Precios Compranet.xlsx";

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Required columns are missing in the source sheet: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Missing headers in row {row} of '{template}': {missing:?}")]
    MissingHeaders {
        template: String,
        row: usize,
        missing: Vec<String>,
    },
}

/// Price of one item, as uploaded to the portal.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceLine {
    pub description: String,
    pub unit_price: f64,
    /// Unit price times maximum quantity
    pub amount: f64,
    pub iva: f64,
    pub other_taxes: f64,
    pub total: f64,
}

impl PriceLine {
    fn new(description: String, unit_price: f64, quantity: f64) -> Self {
        let amount = unit_price * quantity;
        Self {
            description,
            unit_price,
            amount,
            iva: 0.0,
            other_taxes: 0.0,
            total: amount,
        }
    }

    /// Cell values in [`PORTAL_HEADERS`] order.
    fn values(&self) -> [Value; 6] {
        [
            Value::from(self.description.as_str()),
            Value::Number(self.unit_price),
            Value::Number(self.amount),
            Value::Number(self.iva),
            Value::Number(self.other_taxes),
            Value::Number(self.total),
        ]
    }
}

#[derive(Debug)]
pub struct PriceReport {
    pub path: PathBuf,
    pub written: usize,
    /// Descriptions with no matching template row
    pub not_found: Vec<String>,
}

/// Computes one price line per description.
///
/// Rows whose quantity or unit price is not a positive number are skipped.
/// A repeated description replaces the earlier line but keeps its position.
pub fn extract_prices(source: &Dataset) -> Result<Vec<PriceLine>, PropuestaError> {
    let missing: Vec<String> = [DESCRIPTION_COLUMN, QUANTITY_COLUMN, UNIT_PRICE_COLUMN]
        .into_iter()
        .filter(|column| !source.has_column(column))
        .map(str::to_owned)
        .collect();
    if !missing.is_empty() {
        return Err(PricingError::MissingColumns(missing).into());
    }

    let mut lines: Vec<PriceLine> = Vec::new();
    for record in source.records() {
        let description = record.value(DESCRIPTION_COLUMN);
        let quantity = record.value(QUANTITY_COLUMN).as_number().filter(|quantity| *quantity > 0.0);
        let price = record.value(UNIT_PRICE_COLUMN).as_number().filter(|price| *price > 0.0);
        let (Some(quantity), Some(price)) = (quantity, price) else {
            continue;
        };
        if description.is_missing() {
            debug!(quantity, price, "priced row without description skipped");
            continue;
        }
        let line = PriceLine::new(description.to_string(), price, quantity);
        match lines.iter_mut().find(|existing| existing.description == line.description) {
            Some(existing) => *existing = line,
            None => lines.push(line),
        }
    }
    info!(lines = lines.len(), "prices extracted");
    Ok(lines)
}

/// Uppercases and collapses whitespace for description matching.
pub fn normalize_description(text: &str) -> String {
    text.to_uppercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Writes the prices into the active sheet of `template` and saves the
/// result as [`OUTPUT_FILE_NAME`] in `output_dir`.
///
/// Each line goes to the first row below the header row whose description
/// matches; lines without a match are reported.
pub fn write_prices(template: &Path, prices: &[PriceLine], output_dir: &Path) -> Result<PriceReport, PropuestaError> {
    let bytes = fs::read(template)?;
    let name = template.display().to_string();
    let mut workbook = Workbook::from_reader(&name, Cursor::new(bytes.as_slice()))?;
    let sheet_name = workbook.active_sheet_name();
    let sheet_path = workbook.sheet_path(&sheet_name).unwrap_or_default();
    let sheet = workbook.read_sheet(&sheet_name)?;

    let header_row = HEADER_ROW - 1;
    let header_text = |col: usize| sheet.get(header_row, col).map(|value| value.to_string().trim().to_owned());
    let last_col = sheet.col_upper_bound.unwrap_or(0);
    let mut columns = Vec::with_capacity(PORTAL_HEADERS.len());
    let mut missing = Vec::new();
    for header in PORTAL_HEADERS {
        match (0..=last_col).find(|col| header_text(*col).as_deref() == Some(header)) {
            Some(col) => columns.push(col),
            None => missing.push(header.to_owned()),
        }
    }
    if !missing.is_empty() {
        return Err(PricingError::MissingHeaders {
            template: name,
            row: HEADER_ROW,
            missing,
        }
        .into());
    }

    let description_col = columns[0];
    let mut updates = Vec::new();
    let mut not_found = Vec::new();
    for line in prices {
        let key = normalize_description(&line.description);
        let row = sheet.find_row(header_row, description_col, |value| match value {
            Value::Text(text) => normalize_description(text) == key,
            _ => false,
        });
        match row {
            Some(row) => {
                debug!(description = %line.description, row = row + 1, "price placed");
                updates.extend(columns.iter().zip(line.values()).map(|(col, value)| CellUpdate::new(row, *col, value)));
            }
            None => {
                warn!(description = %line.description, "description not found in template");
                not_found.push(line.description.clone());
            }
        }
    }

    let patched = patch_workbook(&bytes, &sheet_path, &updates)?;
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(OUTPUT_FILE_NAME);
    fs::write(&path, patched)?;
    info!(path = %path.display(), written = prices.len() - not_found.len(), "price workbook saved");
    Ok(PriceReport {
        path,
        written: prices.len() - not_found.len(),
        not_found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixtures::text_row;
    use crate::spreadsheet::fixtures::workbook_bytes;
    use crate::spreadsheet::read_sheet;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn source(rows: Vec<Vec<Value>>) -> Dataset {
        Dataset::new(
            vec![DESCRIPTION_COLUMN.to_owned(), QUANTITY_COLUMN.to_owned(), UNIT_PRICE_COLUMN.to_owned()],
            rows,
        )
    }

    #[test]
    fn lines_skip_non_positive_rows() -> Result<(), PropuestaError> {
        let lines = extract_prices(&source(vec![
            vec![Value::from("Gasas"), Value::Number(10.0), Value::Number(2.5)],
            vec![Value::from("Vendas"), Value::Number(0.0), Value::Number(3.0)],
            vec![Value::from("Jeringas"), Value::from("100"), Value::Number(1.0)],
            vec![Value::from("Guantes"), Value::Number(5.0), Value::Empty],
            vec![Value::from("Gasas"), Value::Number(20.0), Value::Number(2.0)],
            vec![Value::from("Cubrebocas"), Value::Number(4.0), Value::Number(1.5)],
        ]))?;

        assert_eq!(
            lines,
            vec![
                PriceLine {
                    description: "Gasas".to_owned(),
                    unit_price: 2.0,
                    amount: 40.0,
                    iva: 0.0,
                    other_taxes: 0.0,
                    total: 40.0,
                },
                PriceLine {
                    description: "Cubrebocas".to_owned(),
                    unit_price: 1.5,
                    amount: 6.0,
                    iva: 0.0,
                    other_taxes: 0.0,
                    total: 6.0,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn source_columns_are_required() {
        let dataset = Dataset::new(vec![DESCRIPTION_COLUMN.to_owned()], Vec::new());
        let error = extract_prices(&dataset).unwrap_err();
        assert!(matches!(error, PropuestaError::PricingError(PricingError::MissingColumns(ref missing)) if missing.len() == 2));
    }

    #[test]
    fn descriptions_match_loosely() {
        assert_eq!(normalize_description("  Gasa  estéril\n10 x 10 "), "GASA ESTÉRIL 10 X 10");
    }

    fn template_rows() -> Vec<Vec<Value>> {
        let mut rows: Vec<Vec<Value>> = (0..4).map(|index| text_row(&[format!("Licitación {index}").as_str()])).collect();
        rows.push(Vec::new());
        rows.push(text_row(&[
            "PARTIDA",
            "DESCRIPCION DETALLADA",
            "PRECIO UNITARIO SIN IMPUESTOS",
            "MONTO DE LA OFERTA SIN IMPUESTOS",
            "IVA",
            "OTROS IMPUESTOS",
            "MONTO TOTAL DE LA OFERTA",
        ]));
        rows.push(text_row(&["1", "GASA  ESTÉRIL"]));
        rows.push(text_row(&["2", "Cubrebocas"]));
        rows
    }

    #[test]
    fn prices_land_on_matching_rows() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let template = dir.path().join("template.xlsx");
        fs::write(&template, workbook_bytes("Precios", template_rows()))?;

        let prices = vec![
            PriceLine::new("Gasa estéril".to_owned(), 2.5, 10.0),
            PriceLine::new("Sin partida".to_owned(), 1.0, 1.0),
        ];
        let report = write_prices(&template, &prices, &dir.path().join("Output"))?;
        assert_eq!(report.written, 1);
        assert_eq!(report.not_found, vec!["Sin partida"]);
        assert_eq!(report.path, dir.path().join("Output").join(OUTPUT_FILE_NAME));

        let sheet = read_sheet(&report.path, None)?;
        assert_eq!(sheet.get(6, 1), Some(&Value::from("Gasa estéril")));
        assert_eq!(sheet.get(6, 2), Some(&Value::Number(2.5)));
        assert_eq!(sheet.get(6, 3), Some(&Value::Number(25.0)));
        assert_eq!(sheet.get(6, 4), Some(&Value::Number(0.0)));
        assert_eq!(sheet.get(6, 6), Some(&Value::Number(25.0)));
        assert_eq!(sheet.get(7, 1), Some(&Value::from("Cubrebocas")));
        assert_eq!(sheet.get(7, 2), None);
        Ok(())
    }

    #[test]
    fn template_headers_are_required() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let template = dir.path().join("template.xlsx");
        let mut rows = template_rows();
        rows[5].truncate(4);
        fs::write(&template, workbook_bytes("Precios", rows))?;

        let error = write_prices(&template, &[], dir.path()).unwrap_err();
        match error {
            PropuestaError::PricingError(PricingError::MissingHeaders { missing, row, .. }) => {
                assert_eq!(row, 6);
                assert_eq!(missing, vec!["IVA", "OTROS IMPUESTOS", "MONTO TOTAL DE LA OFERTA"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }
}
