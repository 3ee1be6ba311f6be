use crate::error::PropuestaError;
use crate::files::resolve;
use crate::files::FilesError;
use crate::spreadsheet::Dataset;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub const FILE_NAME_COLUMN: &str = "Nombre de archivo";
pub const SOURCE_COLUMN: &str = "Source";
pub const MOVE_COLUMN: &str = "Move";

/// A manifest entry whose file was not found at its source.
#[derive(Clone, Debug, PartialEq)]
pub struct MissingFile {
    pub file_name: String,
    pub source: PathBuf,
}

struct MoveEntry {
    file_name: String,
    source: PathBuf,
    destination: PathBuf,
}

/// Copies every file listed in the manifest from `Source` to `Move`.
///
/// Rows with a blank file name, source or destination are ignored. Each
/// distinct destination folder is emptied first, or created when absent.
/// Relative folders resolve against `base`. Returns the entries whose source
/// file does not exist.
pub fn move_files(manifest: &Dataset, base: &Path) -> Result<Vec<MissingFile>, PropuestaError> {
    let entries = manifest_entries(manifest, base)?;

    let destinations: BTreeSet<&Path> = entries.iter().map(|entry| entry.destination.as_path()).collect();
    for destination in destinations {
        clear_directory(destination)?;
    }

    let mut missing = Vec::new();
    for entry in &entries {
        let source = entry.source.join(&entry.file_name);
        if !source.is_file() {
            warn!(path = %source.display(), "file not found");
            missing.push(MissingFile {
                file_name: entry.file_name.clone(),
                source: entry.source.clone(),
            });
            continue;
        }
        fs::create_dir_all(&entry.destination)?;
        fs::copy(&source, entry.destination.join(&entry.file_name))?;
        debug!(file = %entry.file_name, to = %entry.destination.display(), "copied");
    }
    info!(copied = entries.len() - missing.len(), missing = missing.len(), "files moved");
    Ok(missing)
}

fn manifest_entries(manifest: &Dataset, base: &Path) -> Result<Vec<MoveEntry>, PropuestaError> {
    let missing: Vec<String> = [FILE_NAME_COLUMN, SOURCE_COLUMN, MOVE_COLUMN]
        .into_iter()
        .filter(|column| !manifest.has_column(column))
        .map(str::to_owned)
        .collect();
    if !missing.is_empty() {
        return Err(FilesError::MissingColumns {
            source_name: "manifest".to_owned(),
            missing,
        }
        .into());
    }

    Ok(manifest
        .records()
        .filter_map(|record| {
            let file_name = record.value(FILE_NAME_COLUMN).to_string().trim().to_owned();
            let source = record.value(SOURCE_COLUMN).to_string();
            let destination = record.value(MOVE_COLUMN).to_string();
            if file_name.is_empty() || source.trim().is_empty() || destination.trim().is_empty() {
                return None;
            }
            Some(MoveEntry {
                file_name,
                source: resolve(base, &source),
                destination: resolve(base, &destination),
            })
        })
        .collect())
}

/// Removes everything inside `dir`, or creates it.
fn clear_directory(dir: &Path) -> Result<(), PropuestaError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        debug!(dir = %dir.display(), "created");
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let removed = match fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(error) => Err(error),
        };
        match removed {
            Ok(()) => debug!(path = %path.display(), "removed"),
            Err(error) => warn!(path = %path.display(), %error, "cannot remove"),
        }
    }
    Ok(())
}
