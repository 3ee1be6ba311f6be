//! # File Jobs
//!
//! Batch operations over the proposal's files on disk:
//! - `mover`: copies the files a manifest sheet lists into their destination folders
//! - `hybrids`: merges the PDFs listed under each column of a sheet into one file
//! - `requirements`: pulls `{Field: value}` blocks out of a folder of PDFs

pub mod hybrids;
pub mod mover;
pub mod requirements;

pub use hybrids::build_hybrids;
pub use hybrids::hybrid_groups;
pub use hybrids::HybridGroup;
pub use hybrids::HybridReport;
pub use mover::move_files;
pub use mover::MissingFile;
pub use requirements::extract_requirements;
pub use requirements::parse_requirements;
pub use requirements::write_requirements;
pub use requirements::Requirement;

use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("Missing columns {missing:?} in '{source_name}'")]
    MissingColumns { source_name: String, missing: Vec<String> },

    #[error("Folder '{0}' does not exist")]
    FolderNotFound(String),
}

/// Resolves a path read from a sheet against the job's base directory.
pub(crate) fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path.trim());
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}
