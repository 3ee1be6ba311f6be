use crate::error::PropuestaError;
use crate::pdf::PdfError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

/// Text of every page, in page order.
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String, PropuestaError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PdfError::FileNotFound(path.display().to_string()).into());
    }
    let doc = Document::load(path)?;
    let pages: Vec<u32> = doc.get_pages().into_keys().collect();
    let text = doc.extract_text(&pages)?;
    debug!(path = %path.display(), pages = pages.len(), chars = text.len(), "text extracted");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::document_bytes;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn text_of_all_pages() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("requisitos.pdf");
        fs::write(&path, document_bytes(&["{Tipo: Licencia}", "segunda hoja"], &[]))?;

        let text = extract_text(&path)?;
        assert!(text.contains("{Tipo: Licencia}"));
        assert!(text.contains("segunda hoja"));
        Ok(())
    }
}
