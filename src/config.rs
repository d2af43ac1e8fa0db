//! Pipeline Configuration
//! Input locations, sheet names and output sinks.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the pipeline reads from or writes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub campaigns_path: PathBuf,
    /// Field separator of the campaign file. Never sniffed.
    pub campaigns_separator: char,
    pub workbook_path: PathBuf,
    /// Sheets concatenated in this order.
    pub sheets: Vec<String>,
    pub output_dir: PathBuf,
    pub report_json: Option<PathBuf>,
    pub show_charts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            campaigns_path: PathBuf::from("./DatosProyecto/bank-additional.csv"),
            campaigns_separator: ',',
            workbook_path: PathBuf::from("./DatosProyecto/customer-details.xlsx"),
            sheets: vec!["2012".to_string(), "2013".to_string(), "2014".to_string()],
            output_dir: PathBuf::from("./charts"),
            report_json: None,
            show_charts: false,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheets.is_empty() {
            return Err(ConfigError::Invalid("at least one sheet is required".into()));
        }
        if !self.campaigns_separator.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "separator '{}' must be a single ASCII character",
                self.campaigns_separator
            )));
        }
        Ok(())
    }

    /// Separator as the byte the CSV reader expects.
    pub fn separator_byte(&self) -> u8 {
        self.campaigns_separator as u8
    }
}
