use crate::error::PropuestaError;
use crate::files::FilesError;
use crate::pdf::extract_text;
use crate::spreadsheet::Value;
use crate::spreadsheet::WorkbookWriter;
use glob::glob;
use glob::Pattern;
use regex::Regex;
use std::path::Path;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Field values captured from one `{...}` block, in field order.
#[derive(Clone, Debug, PartialEq)]
pub struct Requirement {
    /// PDF file the block came from
    pub file: String,
    pub values: Vec<(String, String)>,
}

/// Finds every `{...}` block in `text` and captures `Field: value` for each
/// field. A value runs up to the next `,` or `}`. Blocks may span lines.
/// Blocks without any of the fields yield nothing.
pub fn parse_requirements(text: &str, fields: &[String]) -> Result<Vec<Vec<(String, String)>>, PropuestaError> {
    let block = Regex::new(r"(?s)\{(.*?)\}")?;
    let patterns = fields
        .iter()
        .map(|field| -> Result<_, PropuestaError> {
            Ok((field, Regex::new(&format!(r"{}:\s*([^,}}]+)", regex::escape(field)))?))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut blocks = Vec::new();
    for captures in block.captures_iter(text) {
        let content = captures[1].replace(['\r', '\n'], " ");
        let values: Vec<(String, String)> = patterns
            .iter()
            .filter_map(|(field, pattern)| {
                pattern
                    .captures(&content)
                    .map(|found| (field.to_string(), found[1].trim().to_owned()))
            })
            .collect();
        if values.is_empty() {
            debug!(block = %content, "block without requested fields");
        } else {
            blocks.push(values);
        }
    }
    Ok(blocks)
}

/// Reads every `*.pdf` directly inside `folder`, in name order, and collects
/// the requirement blocks found in their text.
pub fn extract_requirements(folder: &Path, fields: &[String]) -> Result<Vec<Requirement>, PropuestaError> {
    if !folder.is_dir() {
        return Err(FilesError::FolderNotFound(folder.display().to_string()).into());
    }
    let pattern = format!("{}/*.pdf", Pattern::escape(&folder.to_string_lossy()));
    let mut files = glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
    files.sort();
    if files.is_empty() {
        warn!(folder = %folder.display(), "no PDF files found");
    }

    let mut requirements = Vec::new();
    for path in files {
        let file = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let text = match extract_text(&path) {
            Ok(text) => text,
            Err(error) => {
                warn!(file = %file, %error, "cannot read text, skipped");
                continue;
            }
        };
        let blocks = parse_requirements(&text, fields)?;
        debug!(file = %file, blocks = blocks.len(), "requirements parsed");
        requirements.extend(blocks.into_iter().map(|values| Requirement { file: file.clone(), values }));
    }
    info!(count = requirements.len(), "requirements extracted");
    Ok(requirements)
}

/// Writes the requirements as a table whose columns are the fields in the
/// order they were first seen.
pub fn write_requirements(requirements: &[Requirement], path: &Path) -> Result<(), PropuestaError> {
    let mut columns: Vec<&str> = Vec::new();
    for requirement in requirements {
        for (field, _) in &requirement.values {
            if !columns.contains(&field.as_str()) {
                columns.push(field);
            }
        }
    }

    let mut writer = WorkbookWriter::new("Sheet1");
    writer.push_row(columns.iter().map(|column| Value::from(*column)).collect());
    for requirement in requirements {
        writer.push_row(
            columns
                .iter()
                .map(|column| {
                    requirement
                        .values
                        .iter()
                        .find(|(field, _)| field == column)
                        .map(|(_, value)| Value::from(value.as_str()))
                        .unwrap_or_default()
                })
                .collect(),
        );
    }
    writer.save(path)
}
