//! Configuration module for the topograph engine
//!
//! Configuration can be loaded from TOML files and/or environment variables.
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.topograph/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".topograph").join("config.toml"))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Dispatch behaviour
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Reference extraction
    #[serde(default)]
    pub references: ReferencesConfig,

    /// Output translation
    #[serde(default)]
    pub outputs: OutputsConfig,
}

/// Dispatch behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Treat a plan with zero resources as an extraction failure
    #[serde(default = "default_fail_on_empty_plan")]
    pub fail_on_empty_plan: bool,

    /// Never dispatch data sources to mappers
    #[serde(default = "default_skip_data_sources")]
    pub skip_data_sources: bool,
}

/// Reference extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencesConfig {
    /// Match literal identifiers against other resources when the plan has
    /// no expression for a resource
    #[serde(default = "default_id_fallback")]
    pub id_fallback: bool,

    /// Literal prefixes that mark a value as an identifier (`vpc-`, `arn:`)
    #[serde(default = "default_id_prefixes")]
    pub id_prefixes: Vec<String>,

    /// Attributes of other resources that identifiers are matched against
    #[serde(default = "default_id_attributes")]
    pub id_attributes: Vec<String>,
}

/// Output translation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputsConfig {
    /// Extra attribute renames, applied over the built-in table
    #[serde(default)]
    pub attribute_renames: BTreeMap<String, String>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            fail_on_empty_plan: default_fail_on_empty_plan(),
            skip_data_sources: default_skip_data_sources(),
        }
    }
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            id_fallback: default_id_fallback(),
            id_prefixes: default_id_prefixes(),
            id_attributes: default_id_attributes(),
        }
    }
}

impl ReferencesConfig {
    /// Whether a literal looks like a resource identifier
    pub fn looks_like_id(&self, value: &str) -> bool {
        self.id_prefixes.iter().any(|p| value.starts_with(p.as_str()))
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.references.id_attributes.is_empty() {
            return Err(Error::config(
                "references.id_attributes must not be empty".to_string(),
            ));
        }

        if let Some(blank) = self
            .references
            .id_prefixes
            .iter()
            .find(|p| p.trim().is_empty())
        {
            return Err(Error::config(format!(
                "Invalid id prefix '{blank}': prefixes must not be blank"
            )));
        }

        for (from, to) in &self.outputs.attribute_renames {
            if from.trim().is_empty() || to.trim().is_empty() {
                return Err(Error::config(format!(
                    "Invalid attribute rename '{from}' -> '{to}': names must not be blank"
                )));
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
