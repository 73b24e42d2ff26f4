use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default month/day/year layout of the DOJ and CURRENT DATE columns.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotating log files. File logging is off when unset.
    pub log_dir: Option<PathBuf>,
    /// Filter directive for the file layer (console uses `RUST_LOG`)
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            file_level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    pub input_path: PathBuf,
    pub database_path: PathBuf,
    /// chrono format string used for DOJ and CURRENT DATE
    pub date_format: String,
    /// Rows sampled by the CSV reader when inferring column types
    pub infer_schema_length: usize,
    /// Rows per INSERT statement. SQLite caps bound parameters per statement,
    /// and each row binds 13 of them.
    pub insert_batch_size: usize,
    pub preview_rows: usize,
    pub logging: LoggingConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("salaries.csv"),
            database_path: PathBuf::from("salarios.db"),
            date_format: DEFAULT_DATE_FORMAT.to_owned(),
            infer_schema_length: 10_000,
            insert_batch_size: 64,
            preview_rows: 5,
            logging: LoggingConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Reads a JSON config file. Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid JSON
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads from `path` when given, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Propagates [`LedgerConfig::from_file`] failures
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Writes the config as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}
