use thiserror::Error;

/// Main error type for the propuesta toolkit.
/// Aggregates errors from the standard library, dependencies, and the job modules.
#[derive(Error, Debug)]
pub enum PropuestaError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    StringConversionError(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    RegexError(#[from] regex::Error),

    #[error("{0}")]
    PdfLibraryError(#[from] lopdf::Error),

    #[error("{0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Job module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    DocumentError(#[from] crate::document::DocumentError),

    #[error("{0}")]
    PopulateError(#[from] crate::populate::PopulateError),

    #[error("{0}")]
    PdfError(#[from] crate::pdf::PdfError),

    #[error("{0}")]
    FilesError(#[from] crate::files::FilesError),

    #[error("{0}")]
    PricingError(#[from] crate::pricing::PricingError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, PropuestaError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| PropuestaError::WithContextError(format!("{}: {}", message, e)))
    }
}
