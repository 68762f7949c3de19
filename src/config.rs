//! Configuration management for the UML modeler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (uml.toml)
//! - Environment variables (UML__*)
//!
//! ## Example config file (uml.toml):
//! ```toml
//! [storage]
//! dir = "./saved_files"
//! index_file = "NAME_LIST.json"
//! output_format = "pretty"
//! atomic_writes = true
//!
//! [logging]
//! level = "info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Snapshot storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding snapshot files and the index
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,

    /// File name of the snapshot index inside `dir`
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// JSON layout of written files
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Write through a temporary file and rename it into place
    #[serde(default = "default_true")]
    pub atomic_writes: bool,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_storage_dir() -> PathBuf {
    PathBuf::from("saved_files")
}

fn default_index_file() -> String {
    "NAME_LIST.json".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            index_file: default_index_file(),
            output_format: OutputFormat::Pretty,
            atomic_writes: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ModelConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["uml.toml", ".uml.toml", "config/uml.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "uml", "uml-modeler") {
            let xdg_config = config_dir.config_dir().join("uml.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // UML__STORAGE__DIR, UML__LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("UML")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Snapshot directory, with relative paths resolved against the cwd
    pub fn storage_dir(&self) -> PathBuf {
        if self.storage.dir.is_absolute() {
            self.storage.dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.storage.dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.storage.index_file, "NAME_LIST.json");
        assert!(config.storage.atomic_writes);
        assert_eq!(config.storage.output_format, OutputFormat::Pretty);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_serialize_config() {
        let config = ModelConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[storage]\ndir = \"/tmp/models\"\noutput_format = \"compact\"\natomic_writes = false\n",
        )
        .unwrap();

        let config = ModelConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.storage.dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.storage.output_format, OutputFormat::Compact);
        assert!(!config.storage.atomic_writes);
        assert_eq!(config.storage.index_file, "NAME_LIST.json");
        assert_eq!(config.storage_dir(), PathBuf::from("/tmp/models"));
    }
}
