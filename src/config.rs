//! Configuration management for the ERD registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (erd.toml)
//! - Environment variables (ERD__*)
//!
//! ## Example config file (erd.toml):
//! ```toml
//! [diagram]
//! rankdir = "LR"
//! graphviz_bin = "/usr/local/bin/dot"
//! show_fields = true
//! show_join_tables = false
//!
//! [validation]
//! require_back_references = true
//! unique_one_to_one = true
//!
//! [export]
//! output_format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErdConfig {
    /// Diagram rendering settings
    #[serde(default)]
    pub diagram: DiagramConfig,

    /// Finalize-time validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// JSON export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Diagram rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramConfig {
    /// GraphViz rank direction (LR, TB, RL, BT)
    #[serde(default = "default_rankdir")]
    pub rankdir: String,

    /// Path or name of the GraphViz `dot` binary
    #[serde(default = "default_graphviz_bin")]
    pub graphviz_bin: PathBuf,

    /// List columns inside entity boxes
    #[serde(default = "default_true")]
    pub show_fields: bool,

    /// Draw plain join tables as boxes (they are always drawn as edges)
    #[serde(default)]
    pub show_join_tables: bool,

    /// Fill colour of regular entity boxes
    #[serde(default = "default_entity_color")]
    pub entity_color: String,

    /// Fill colour of association entity boxes
    #[serde(default = "default_association_color")]
    pub association_color: String,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Every relationship must be declared on both entities
    #[serde(default = "default_true")]
    pub require_back_references: bool,

    /// One-to-one foreign keys must be unique columns
    #[serde(default = "default_true")]
    pub unique_one_to_one: bool,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_rankdir() -> String {
    "LR".to_string()
}

fn default_graphviz_bin() -> PathBuf {
    PathBuf::from("dot")
}

fn default_entity_color() -> String {
    "#00BCD4".to_string()
}

fn default_association_color() -> String {
    "#FF9800".to_string()
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            rankdir: default_rankdir(),
            graphviz_bin: default_graphviz_bin(),
            show_fields: true,
            show_join_tables: false,
            entity_color: default_entity_color(),
            association_color: default_association_color(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_back_references: true,
            unique_one_to_one: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Pretty,
        }
    }
}

impl ErdConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["erd.toml", ".erd.toml", "config/erd.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "erd") {
            let xdg_config = config_dir.config_dir().join("erd.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ERD__DIAGRAM__RANKDIR=TB etc.
        builder = builder.add_source(
            Environment::with_prefix("ERD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        std::fs::write(path, self.to_toml()?)
    }

    pub fn to_toml(&self) -> std::io::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ErdConfig::default();
        assert!(config.validation.require_back_references);
        assert!(config.validation.unique_one_to_one);
        assert_eq!(config.diagram.rankdir, "LR");
        assert_eq!(config.export.output_format, OutputFormat::Pretty);
    }

    #[test]
    fn test_serialize_config() {
        let config = ErdConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[diagram]"));
        assert!(toml_str.contains("[validation]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[diagram]\nrankdir = \"TB\"\n\n[validation]\nrequire_back_references = false\n",
        )
        .unwrap();

        let config = ErdConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.diagram.rankdir, "TB");
        assert!(!config.validation.require_back_references);
        assert!(config.validation.unique_one_to_one);
    }
}
