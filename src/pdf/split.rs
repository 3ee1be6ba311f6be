use crate::error::PropuestaError;
use crate::pdf::bookmarks::bookmarks;
use crate::pdf::PdfError;
use lopdf::Document;
use std::fs;
use std::path::Path;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Reads slice names stored as one `|`-separated list. Names are trimmed and
/// blanks dropped.
pub fn load_bookmark_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>, PropuestaError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PdfError::NamesFileNotFound(path.display().to_string()).into());
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .trim()
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Keeps letters, digits, space, `-` and `_`, then trims trailing whitespace.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|character| character.is_alphanumeric() || matches!(character, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .to_owned()
}

/// Splits a PDF at its top-level bookmarks.
///
/// Slice `i` runs from the page of bookmark `i` up to, not including, the
/// page of bookmark `i + 1`; the last slice runs to the end. Each slice is
/// written to `output_dir` as `<sanitized name>.pdf`. Slices that would hold
/// no pages are skipped. Returns the file names written, in order.
pub fn split_by_bookmarks<P, Q>(pdf: P, names: &[String], output_dir: Q) -> Result<Vec<String>, PropuestaError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let pdf = pdf.as_ref();
    if !pdf.is_file() {
        return Err(PdfError::FileNotFound(pdf.display().to_string()).into());
    }
    let doc = Document::load(pdf)?;
    let marks = bookmarks(&doc)?;
    if marks.len() != names.len() {
        return Err(PdfError::BookmarkCountMismatch {
            bookmarks: marks.len(),
            names: names.len(),
        }
        .into());
    }

    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;
    let page_count = doc.get_pages().len() as u32;

    let mut written = Vec::with_capacity(names.len());
    for (index, (mark, name)) in marks.iter().zip(names).enumerate() {
        let start = mark.page;
        let end = marks.get(index + 1).map(|next| next.page).unwrap_or(page_count + 1);
        let file_name = format!("{}.pdf", sanitize_file_name(name));
        if start >= end {
            warn!(name = %file_name, start, end, "bookmark slice has no pages, skipped");
            continue;
        }

        let mut slice = page_range(&doc, start, end)?;
        let path = output_dir.join(&file_name);
        slice.save(&path)?;
        debug!(path = %path.display(), first = start, last = end - 1, "slice written");
        written.push(file_name);
    }
    info!(count = written.len(), dir = %output_dir.display(), "PDF split by bookmarks");
    Ok(written)
}

/// Copy of `doc` holding pages `[start, end)` only, without the outline.
fn page_range(doc: &Document, start: u32, end: u32) -> Result<Document, PropuestaError> {
    let mut slice = doc.clone();
    let page_count = slice.get_pages().len() as u32;
    let mut unwanted: Vec<u32> = (1..=page_count).filter(|page| *page < start || *page >= end).collect();
    unwanted.reverse();
    for page in unwanted {
        slice.delete_pages(&[page]);
    }

    let catalog_id = slice.trailer.get(b"Root")?.as_reference()?;
    slice.get_object_mut(catalog_id)?.as_dict_mut()?.remove(b"Outlines");
    slice.prune_objects();
    slice.compress();
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::document_bytes;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn names_file_is_pipe_separated() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("Bookmarks.md");
        fs::write(&path, " Carta 1 | Anexo técnico ||\nAnexo 3 \n")?;
        assert_eq!(load_bookmark_names(&path)?, names(&["Carta 1", "Anexo técnico", "Anexo 3"]));

        let missing = load_bookmark_names(dir.path().join("none.md")).unwrap_err();
        assert!(matches!(missing, PropuestaError::PdfError(PdfError::NamesFileNotFound(_))));
        Ok(())
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("Anexo 2: Carta/Compromiso "), "Anexo 2 CartaCompromiso");
        assert_eq!(sanitize_file_name("Propuesta_técnica-01"), "Propuesta_técnica-01");
    }

    #[test]
    fn one_file_per_bookmark() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let pdf = dir.path().join("input.pdf");
        fs::write(&pdf, document_bytes(&["1", "2", "3", "4", "5"], &[("A", 1), ("B", 3), ("C", 4)]))?;

        let output = dir.path().join("Output");
        let written = split_by_bookmarks(&pdf, &names(&["Carta", "Anexo: 1", "Cierre"]), &output)?;
        assert_eq!(written, names(&["Carta.pdf", "Anexo 1.pdf", "Cierre.pdf"]));

        let counts: Vec<usize> = written
            .iter()
            .map(|name| Document::load(output.join(name)).map(|doc| doc.get_pages().len()))
            .collect::<Result<_, _>>()?;
        assert_eq!(counts, vec![2, 1, 2]);
        Ok(())
    }

    #[test]
    fn empty_slices_are_skipped() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let pdf = dir.path().join("input.pdf");
        fs::write(&pdf, document_bytes(&["1", "2", "3"], &[("A", 2), ("B", 2), ("C", 3)]))?;

        let written = split_by_bookmarks(&pdf, &names(&["a", "b", "c"]), dir.path())?;
        assert_eq!(written, names(&["b.pdf", "c.pdf"]));
        Ok(())
    }

    #[test]
    fn name_count_must_match() -> Result<(), PropuestaError> {
        let dir = TempDir::new()?;
        let pdf = dir.path().join("input.pdf");
        fs::write(&pdf, document_bytes(&["1", "2"], &[("A", 1), ("B", 2)]))?;

        let error = split_by_bookmarks(&pdf, &names(&["solo"]), dir.path()).unwrap_err();
        assert!(matches!(
            error,
            PropuestaError::PdfError(PdfError::BookmarkCountMismatch { bookmarks: 2, names: 1 })
        ));
        Ok(())
    }
}
