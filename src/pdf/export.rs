use crate::error::PropuestaError;
use crate::pdf::PdfError;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

/// Converts an office document to PDF with a LibreOffice-compatible
/// converter (`<converter> --headless --convert-to pdf --outdir <dir> <input>`).
///
/// The PDF lands next to the input, named after it. Returns its path.
pub fn export_pdf<P: AsRef<Path>>(input: P, converter: &str) -> Result<PathBuf, PropuestaError> {
    let input = input.as_ref();
    if !input.is_file() {
        return Err(PdfError::FileNotFound(input.display().to_string()).into());
    }
    let outdir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let failure = |reason: String| PdfError::ConverterFailed {
        converter: converter.to_owned(),
        input: input.display().to_string(),
        reason,
    };
    let output = Command::new(converter)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(&outdir)
        .arg(input)
        .output()
        .map_err(|error| failure(error.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        return Err(failure(format!("{}: {}", output.status, stderr)).into());
    }

    let pdf = outdir.join(input.with_extension("pdf").file_name().unwrap_or_default());
    if !pdf.is_file() {
        return Err(failure(format!("no output at '{}'", pdf.display())).into());
    }
    info!(pdf = %pdf.display(), "document exported");
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_input_is_reported() {
        let error = export_pdf("/nonexistent/Cartas_updated.docx", "soffice").unwrap_err();
        assert!(matches!(error, PropuestaError::PdfError(PdfError::FileNotFound(_))));
    }

    #[test]
    fn converter_failure_is_reported() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let input = dir.path().join("Cartas_updated.docx");
        fs::write(&input, b"not really a document")?;

        let error = export_pdf(&input, "propuesta-no-such-converter").unwrap_err();
        assert!(matches!(error, PropuestaError::PdfError(PdfError::ConverterFailed { .. })));
        Ok(())
    }
}
