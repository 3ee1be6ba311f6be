use crate::error::PropuestaError;
use crate::files::resolve;
use crate::pdf::merge_files;
use crate::spreadsheet::Sheet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// One column of the hybrids sheet: the output file named in the first row
/// and the files listed below it.
#[derive(Clone, Debug, PartialEq)]
pub struct HybridGroup {
    pub output: String,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
pub struct HybridReport {
    /// Outputs written by merging
    pub merged: Vec<String>,
    /// Outputs written by copying their only input
    pub copied: Vec<String>,
    /// Outputs not written because inputs were missing, with those inputs
    pub missing: Vec<(String, Vec<PathBuf>)>,
    /// Outputs whose copy or merge failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Reads the groups from a sheet that has no header row.
pub fn hybrid_groups(sheet: &Sheet) -> Vec<HybridGroup> {
    let grid = sheet.grid();
    let Some(names) = grid.first() else {
        return Vec::new();
    };
    names
        .iter()
        .enumerate()
        .filter_map(|(col, name)| {
            let output = name.to_string().trim().to_owned();
            if output.is_empty() {
                warn!(col, "hybrid column without output name, skipped");
                return None;
            }
            let files = grid[1..]
                .iter()
                .filter_map(|row| row.get(col))
                .filter(|value| !value.is_missing())
                .map(|value| value.to_string().trim().to_owned())
                .collect();
            Some(HybridGroup { output, files })
        })
        .collect()
}

/// Writes every group into `output_dir`.
///
/// A group with one file is a plain copy; with several files it is merged,
/// but only when every input exists. Relative inputs resolve against `base`.
pub fn build_hybrids(groups: &[HybridGroup], base: &Path, output_dir: &Path) -> Result<HybridReport, PropuestaError> {
    fs::create_dir_all(output_dir)?;
    let mut report = HybridReport::default();

    for group in groups {
        let target = output_dir.join(&group.output);
        let inputs: Vec<PathBuf> = group.files.iter().map(|file| resolve(base, file)).collect();
        let missing: Vec<PathBuf> = inputs.iter().filter(|input| !input.is_file()).cloned().collect();
        if !missing.is_empty() {
            warn!(output = %group.output, missing = missing.len(), "inputs missing, not written");
            report.missing.push((group.output.clone(), missing));
            continue;
        }

        match inputs.as_slice() {
            [] => debug!(output = %group.output, "no files listed, skipped"),
            [single] => match fs::copy(single, &target) {
                Ok(_) => {
                    debug!(output = %group.output, "copied");
                    report.copied.push(group.output.clone());
                }
                Err(reason) => {
                    error!(output = %group.output, %reason, "copy failed");
                    report.failed.push((group.output.clone(), reason.to_string()));
                }
            },
            _ => match merge_files(&inputs, &target) {
                Ok(pages) => {
                    info!(output = %group.output, pages, "merged");
                    report.merged.push(group.output.clone());
                }
                Err(reason) => {
                    error!(output = %group.output, %reason, "merge failed");
                    report.failed.push((group.output.clone(), reason.to_string()));
                }
            },
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::document_bytes;
    use crate::spreadsheet::fixtures::text_row;
    use crate::spreadsheet::fixtures::workbook_bytes;
    use crate::spreadsheet::Value;
    use crate::spreadsheet::Workbook;
    use lopdf::Document;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn groups_follow_columns() -> Result<(), PropuestaError> {
        let bytes = workbook_bytes(
            "Hybrids",
            vec![
                text_row(&["Sobre A.pdf", "Sobre B.pdf", ""]),
                text_row(&["a1.pdf", "b1.pdf", "huérfano.pdf"]),
                vec![Value::from("a2.pdf"), Value::Empty],
            ],
        );
        let sheet = Workbook::from_reader("Cartas.xlsx", Cursor::new(bytes))?.read_sheet("Hybrids")?;
        assert_eq!(
            hybrid_groups(&sheet),
            vec![
                HybridGroup {
                    output: "Sobre A.pdf".to_owned(),
                    files: vec!["a1.pdf".to_owned(), "a2.pdf".to_owned()],
                },
                HybridGroup {
                    output: "Sobre B.pdf".to_owned(),
                    files: vec!["b1.pdf".to_owned()],
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn merge_copy_and_missing() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("a1.pdf"), document_bytes(&["1", "2"], &[]))?;
        fs::write(dir.path().join("a2.pdf"), document_bytes(&["3"], &[]))?;
        fs::write(dir.path().join("b1.pdf"), document_bytes(&["solo"], &[]))?;
        let groups = vec![
            HybridGroup {
                output: "A.pdf".to_owned(),
                files: vec!["a1.pdf".to_owned(), "a2.pdf".to_owned()],
            },
            HybridGroup {
                output: "B.pdf".to_owned(),
                files: vec!["b1.pdf".to_owned()],
            },
            HybridGroup {
                output: "C.pdf".to_owned(),
                files: vec!["a1.pdf".to_owned(), "c9.pdf".to_owned()],
            },
            HybridGroup {
                output: "D.pdf".to_owned(),
                files: Vec::new(),
            },
        ];

        let output = dir.path().join("Híbridos");
        let report = build_hybrids(&groups, dir.path(), &output)?;
        assert_eq!(report.merged, vec!["A.pdf"]);
        assert_eq!(report.copied, vec!["B.pdf"]);
        assert_eq!(report.missing, vec![("C.pdf".to_owned(), vec![dir.path().join("c9.pdf")])]);
        assert!(report.failed.is_empty());

        assert_eq!(Document::load(output.join("A.pdf"))?.get_pages().len(), 3);
        assert!(output.join("B.pdf").is_file());
        assert!(!output.join("C.pdf").exists());
        assert!(!output.join("D.pdf").exists());
        Ok(())
    }

    #[test]
    fn failed_copy_does_not_stop_later_groups() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("a1.pdf"), document_bytes(&["1"], &[]))?;
        fs::write(dir.path().join("a2.pdf"), document_bytes(&["2"], &[]))?;
        let output = dir.path().join("Híbridos");
        fs::create_dir_all(output.join("Ocupado.pdf"))?;
        let groups = vec![
            HybridGroup {
                output: "Ocupado.pdf".to_owned(),
                files: vec!["a1.pdf".to_owned()],
            },
            HybridGroup {
                output: "Sobre.pdf".to_owned(),
                files: vec!["a1.pdf".to_owned(), "a2.pdf".to_owned()],
            },
        ];

        let report = build_hybrids(&groups, dir.path(), &output)?;
        assert!(report.copied.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Ocupado.pdf");
        assert_eq!(report.merged, vec!["Sobre.pdf"]);
        Ok(())
    }
}
