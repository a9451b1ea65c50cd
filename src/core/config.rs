// src/core/config.rs

use crate::core::common::RecoveryError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a recovery run.
///
/// File names are resolved relative to the scenario directory. Any field left
/// out of a TOML file falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryConfig {
    pub wal_file: String,
    pub pages_file: String,
    pub master_file: String,
    pub report_file: String,
    pub pages_output_file: String,
    pub write_outputs: bool,
    pub validate_lsn_ordering: bool,
}

/// Builder for [`RecoveryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RecoveryConfigBuilder {
    wal_file: Option<String>,
    pages_file: Option<String>,
    master_file: Option<String>,
    report_file: Option<String>,
    pages_output_file: Option<String>,
    write_outputs: Option<bool>,
    validate_lsn_ordering: Option<bool>,
}

impl RecoveryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log file name
    pub fn wal_file<S: Into<String>>(mut self, name: S) -> Self {
        self.wal_file = Some(name.into());
        self
    }

    /// Sets the page snapshot file name
    pub fn pages_file<S: Into<String>>(mut self, name: S) -> Self {
        self.pages_file = Some(name.into());
        self
    }

    /// Sets the master record file name
    pub fn master_file<S: Into<String>>(mut self, name: S) -> Self {
        self.master_file = Some(name.into());
        self
    }

    /// Sets the text report output file name
    pub fn report_file<S: Into<String>>(mut self, name: S) -> Self {
        self.report_file = Some(name.into());
        self
    }

    /// Sets the recovered pages output file name
    pub fn pages_output_file<S: Into<String>>(mut self, name: S) -> Self {
        self.pages_output_file = Some(name.into());
        self
    }

    /// Enables or disables writing the output artifacts
    pub fn write_outputs(mut self, enabled: bool) -> Self {
        self.write_outputs = Some(enabled);
        self
    }

    /// Enables or disables the strict LSN ordering check while reading the log
    pub fn validate_lsn_ordering(mut self, enabled: bool) -> Self {
        self.validate_lsn_ordering = Some(enabled);
        self
    }

    /// Builds the config and validates it.
    pub fn build(self) -> Result<RecoveryConfig, RecoveryError> {
        let defaults = RecoveryConfig::default();
        let config = RecoveryConfig {
            wal_file: self.wal_file.unwrap_or(defaults.wal_file),
            pages_file: self.pages_file.unwrap_or(defaults.pages_file),
            master_file: self.master_file.unwrap_or(defaults.master_file),
            report_file: self.report_file.unwrap_or(defaults.report_file),
            pages_output_file: self.pages_output_file.unwrap_or(defaults.pages_output_file),
            write_outputs: self.write_outputs.unwrap_or(defaults.write_outputs),
            validate_lsn_ordering: self.validate_lsn_ordering.unwrap_or(defaults.validate_lsn_ordering),
        };

        config.validate()?;
        Ok(config)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            wal_file: "wal.jsonl".to_string(),
            pages_file: "disk_pages.json".to_string(),
            master_file: "master.json".to_string(),
            report_file: "out_report.txt".to_string(),
            pages_output_file: "out_pages.json".to_string(),
            write_outputs: true,
            validate_lsn_ordering: true,
        }
    }
}

impl RecoveryConfig {
    pub fn builder() -> RecoveryConfigBuilder {
        RecoveryConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// Every file name must be non-empty, and neither output may overwrite an
    /// input or the other output.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        let named = [
            ("wal_file", &self.wal_file),
            ("pages_file", &self.pages_file),
            ("master_file", &self.master_file),
            ("report_file", &self.report_file),
            ("pages_output_file", &self.pages_output_file),
        ];
        if let Some((field, _)) = named.iter().find(|(_, name)| name.trim().is_empty()) {
            return Err(RecoveryError::Configuration(format!("{field} must not be empty")));
        }

        let inputs = [&self.wal_file, &self.pages_file, &self.master_file];
        for (field, output) in [("report_file", &self.report_file), ("pages_output_file", &self.pages_output_file)] {
            if inputs.contains(&output) {
                return Err(RecoveryError::Configuration(format!(
                    "{field} '{output}' would overwrite a scenario input"
                )));
            }
        }

        if self.report_file == self.pages_output_file {
            return Err(RecoveryError::Configuration(
                "report_file and pages_output_file must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryError::Configuration` if parsing or validation fails,
    /// and `RecoveryError::Io` for any other read failure.
    pub fn load_from_file(path: &Path) -> Result<Self, RecoveryError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Self = toml::from_str(&contents).map_err(|e| {
                    RecoveryError::Configuration(format!(
                        "Failed to parse config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;

                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RecoveryError::Io(e)),
        }
    }

    /// Loads configuration from an optional TOML file path, falling back to
    /// the defaults for `None` or a missing file.
    pub fn load_or_default(optional_path: Option<&Path>) -> Result<Self, RecoveryError> {
        match optional_path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
