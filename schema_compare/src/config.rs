//! Configuration handling for SchemaCompare

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete SchemaCompare configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub schema: SchemaConfig,
    pub comparator: ComparatorConfig,
    pub definitions: DefinitionsConfig,
    pub logging: Option<LoggingConfig>,
    pub output: OutputConfig,
}

/// Settings applied to every schema built from definitions
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SchemaConfig {
    /// Default namespace of the schema
    pub name: String,
    pub max_identifier_length: usize,
    pub explicit_foreign_key_indexes: bool,
    /// Options copied onto every table created through `DatabaseSchema::create_table`
    pub default_table_options: IndexMap<String, serde_json::Value>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            name: "public".to_string(),
            max_identifier_length: 63,
            explicit_foreign_key_indexes: false,
            default_table_options: IndexMap::new(),
        }
    }
}

/// Comparator behaviour
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ComparatorConfig {
    pub detect_column_renames: bool,
    pub detect_index_renames: bool,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            detect_column_renames: true,
            detect_index_renames: true,
        }
    }
}

/// Definition file discovery
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DefinitionsConfig {
    pub recursive_scan: bool,
    /// Glob patterns matched against every discovered path
    pub exclude_paths: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            recursive_scan: true,
            exclude_paths: Vec::new(),
            extensions: vec![
                "toml".to_string(),
                "yaml".to_string(),
                "yml".to_string(),
                "json".to_string(),
            ],
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            // reports own stdout
            stdout: false,
        }
    }
}

/// Report rendering configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
    pub include_timestamp: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            pretty: true,
            include_timestamp: true,
        }
    }
}

/// Report output format
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(Error::ConfigError(format!("Unknown output format: {}", other))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        f.write_str(name)
    }
}
