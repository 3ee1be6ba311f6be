//! ZIP archive helper utilities for Office Open XML packages (.xlsx, .docx)
//! Provides convenient methods for accessing and rewriting files within ZIP archives

use crate::error::PropuestaError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Helper trait for ZIP archive operations with specialized reader creation
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a file from the ZIP archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, PropuestaError>;

    /// Creates an XML reader for a file within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, PropuestaError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    /// Gets a file from the ZIP archive by name with case-insensitive matching
    /// and path separator normalization (backslash to forward slash)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, PropuestaError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, PropuestaError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}

/// One file of an in-memory package, kept in archive order
#[derive(Clone, Debug)]
pub(crate) struct Part {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) stored: bool,
}

/// Loads every file of an archive into memory, skipping directory entries
pub(crate) fn read_parts<RS: Read + Seek>(archive: &mut ZipArchive<RS>) -> Result<Vec<Part>, PropuestaError> {
    let mut parts = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        parts.push(Part {
            name: file.name().to_owned(),
            data,
            stored: file.compression() == CompressionMethod::Stored,
        });
    }
    Ok(parts)
}

/// Writes parts into a new archive, keeping stored entries uncompressed
pub(crate) fn write_parts<W: Write + Seek>(writer: W, parts: &[Part]) -> Result<W, PropuestaError> {
    let mut zip = ZipWriter::new(writer);
    for part in parts {
        let method = if part.stored {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        zip.start_file(part.name.as_str(), SimpleFileOptions::default().compression_method(method))?;
        zip.write_all(&part.data)?;
    }
    Ok(zip.finish()?)
}

/// Finds a part by name with the same matching rules as [`ZipHelper::file`]
pub(crate) fn find_part<'a>(parts: &'a [Part], name: &str) -> Option<&'a Part> {
    let pattern = name.replace('\\', "/");
    parts.iter().find(|part| pattern.eq_ignore_ascii_case(&part.name))
}

/// Replaces the data of a part, appending it when absent
pub(crate) fn put_part(parts: &mut Vec<Part>, name: &str, data: Vec<u8>) {
    let pattern = name.replace('\\', "/");
    match parts.iter_mut().find(|part| pattern.eq_ignore_ascii_case(&part.name)) {
        Some(part) => part.data = data,
        None => parts.push(Part {
            name: pattern,
            data,
            stored: false,
        }),
    }
}
