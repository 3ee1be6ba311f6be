//! Job configuration loaded from TOML.
//!
//! The workflow's defaults, including every table the letters template
//! carries, are compiled in from `config/propuesta.toml`. A file passed on
//! the command line replaces them. Relative paths resolve against
//! `working_folder`, which itself defaults to the current directory.

use crate::error::PropuestaError;
use crate::populate::TableSpec;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

const DEFAULT_CONFIG: &str = include_str!("../config/propuesta.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration '{0}': {1}")]
    ReadError(String, String),

    #[error("Configuration has no table named '{0}'")]
    UnknownTable(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base directory for every relative path below
    #[serde(default)]
    pub working_folder: Option<PathBuf>,
    pub populate: PopulateConfig,
    pub export: ExportConfig,
    pub split: SplitConfig,
    pub mover: MoverConfig,
    pub hybrids: HybridsConfig,
    pub requirements: RequirementsConfig,
    pub prices: PricesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulateConfig {
    /// Word template with the tables to fill
    pub document: PathBuf,
    /// Workbook with the source rows
    pub workbook: PathBuf,
    pub sheet: String,
    /// Column the source rows are sorted by before any table is filled
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Rows shown per table by the `tables` command
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    /// Style-name prefix of the paragraphs that become PDF bookmarks
    #[serde(default = "default_heading_style")]
    pub heading_style: String,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Office converter executable
    pub converter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    pub pdf: PathBuf,
    /// Text file with the slice names separated by `|`
    pub names: PathBuf,
    pub output: PathBuf,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoverConfig {
    pub workbook: PathBuf,
    pub sheet: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridsConfig {
    pub workbook: PathBuf,
    pub sheet: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequirementsConfig {
    pub folder: PathBuf,
    pub fields: Vec<String>,
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    pub source: PathBuf,
    pub sheet: String,
    pub template: PathBuf,
    pub output: PathBuf,
}

fn default_preview_rows() -> usize {
    5
}

fn default_heading_style() -> String {
    "Heading 1".to_owned()
}

impl Config {
    /// Loads the file at `path`, or the built-in configuration when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, PropuestaError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|error| ConfigError::ReadError(path.display().to_string(), error.to_string()))?;
                debug!(path = %path.display(), "configuration loaded");
                Self::parse(&content)
            }
            None => Self::parse(DEFAULT_CONFIG),
        }
    }

    pub fn parse(content: &str) -> Result<Self, PropuestaError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves a configured path against the working folder.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        match &self.working_folder {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Base directory for relative paths.
    pub fn base_dir(&self) -> PathBuf {
        self.working_folder.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Finds a configured table by name.
    pub fn table(&self, name: &str) -> Result<&TableSpec, ConfigError> {
        self.populate
            .tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| ConfigError::UnknownTable(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::FieldKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_configuration_parses() -> Result<(), PropuestaError> {
        let config = Config::load(None)?;
        assert_eq!(config.populate.tables.len(), 11);
        assert_eq!(config.populate.sort_by.as_deref(), Some("NUMERO DE PARTIDA"));
        assert_eq!(config.requirements.fields, vec!["Área", "Tipo", "Nombre"]);

        let economic = config.table("Propuesta económica")?;
        assert_eq!(economic.table, 29);
        assert_eq!(economic.header_row, 2);
        assert!(economic.total);
        assert_eq!(economic.headers.len(), economic.fields.len());
        assert_eq!(economic.headers[0], "No.\nPartida");
        assert_eq!(economic.fields[13].kind, FieldKind::Currency);
        Ok(())
    }

    #[test]
    fn every_builtin_total_header_is_mapped() -> Result<(), PropuestaError> {
        let config = Config::load(None)?;
        for table in &config.populate.tables {
            for header in &table.total_headers {
                let position = table.headers.iter().position(|expected| expected == header);
                assert!(position.map(|index| index < table.fields.len()).unwrap_or(false), "{header}");
            }
        }
        Ok(())
    }

    #[test]
    fn relative_paths_use_working_folder() -> Result<(), PropuestaError> {
        let mut config = Config::load(None)?;
        assert_eq!(config.resolve("Cartas.docx"), PathBuf::from("Cartas.docx"));
        config.working_folder = Some(PathBuf::from("/srv/licitacion"));
        assert_eq!(config.resolve("Cartas.docx"), PathBuf::from("/srv/licitacion/Cartas.docx"));
        assert_eq!(config.resolve("/tmp/x.pdf"), PathBuf::from("/tmp/x.pdf"));
        Ok(())
    }

    #[test]
    fn missing_file_is_reported() {
        let error = Config::load(Some(Path::new("/nonexistent/propuesta.toml"))).unwrap_err();
        assert!(matches!(error, PropuestaError::ConfigError(ConfigError::ReadError(_, _))));
    }

    #[test]
    fn table_defaults_apply() -> Result<(), PropuestaError> {
        #[derive(Deserialize)]
        struct Tables {
            tables: Vec<TableSpec>,
        }
        let parsed: Tables = toml::from_str(
            r#"
[[tables]]
table = 3
headers = ["CLAVE"]
fields = [{ field = "CLAVE (12 DÍGITOS)" }]
"#,
        )?;

        let table = &parsed.tables[0];
        assert_eq!(table.header_row, 1);
        assert!(!table.total);
        assert!(table.filter.is_none());
        assert_eq!(table.fields[0].kind, FieldKind::String);
        assert_eq!(table.label(), "table 3");
        Ok(())
    }
}
