//! # Propuesta
//!
//! Batch jobs for assembling a bid proposal from local office files.
//!
//! ## Features
//!
//! - **Table population**: fill tables of a Word (`.docx`) template from the rows of an
//!   Excel (`.xlsx`) sheet, with per-column currency, number and text rendering, totals,
//!   summary rows and `{header}` amount-in-words placeholders
//! - **Document inspection**: preview every table and list the headings that become PDF bookmarks
//! - **PDF jobs**: export through an office converter, split at top-level bookmarks,
//!   merge files, extract page text
//! - **File jobs**: copy the files a manifest lists, build merged "hybrid" PDFs,
//!   extract `{Field: value}` requirement blocks into a workbook
//! - **Portal prices**: write unit prices and offer amounts into the procurement portal's
//!   upload template
//!
//! Every job is a plain function over paths or in-memory values; the `propuesta`
//! binary wires them to a TOML configuration and command-line subcommands.

pub mod config;
pub mod document;
pub mod error;
pub mod files;
mod helpers;
pub mod pdf;
pub mod populate;
pub mod pricing;
pub mod spreadsheet;

pub use config::Config;
pub use document::Document;
pub use error::PropuestaError;
pub use populate::populate;
pub use populate::PopulateError;
pub use populate::TableSpec;
pub use spreadsheet::Dataset;
