//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `TOPOGRAPH_` and use double
    /// underscores for nested values. List values are comma separated. For
    /// example:
    /// - `TOPOGRAPH_MAPPING__FAIL_ON_EMPTY_PLAN=true`
    /// - `TOPOGRAPH_REFERENCES__ID_PREFIXES=vpc-,subnet-`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // Set defaults explicitly (config crate doesn't apply serde defaults for missing sections)
        let builder = set_config_default(
            builder,
            "mapping.fail_on_empty_plan",
            default_fail_on_empty_plan(),
        )?;
        let builder = set_config_default(
            builder,
            "mapping.skip_data_sources",
            default_skip_data_sources(),
        )?;
        let builder = set_config_default(builder, "references.id_fallback", default_id_fallback())?;
        let builder = set_config_default(builder, "references.id_prefixes", default_id_prefixes())?;
        let mut builder =
            set_config_default(builder, "references.id_attributes", default_id_attributes())?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with TOPOGRAPH_ prefix
        builder = builder.add_source(
            Environment::with_prefix("TOPOGRAPH")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("references.id_prefixes")
                .with_list_parse_key("references.id_attributes"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.topograph/config.toml or custom --config path)
    /// 3. Environment variables (TOPOGRAPH_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
