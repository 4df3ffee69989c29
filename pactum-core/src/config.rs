//! Contract checking configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by every contracted callable built from the same config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Maximum number of characters kept from each value representation in a
    /// violation. Zero keeps the whole representation.
    pub max_repr_len: usize,

    /// Render context values with `{:#?}` instead of `{:?}`
    pub pretty_repr: bool,

    /// Emit a `warn` event whenever a violation is raised
    pub log_violations: bool,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self { max_repr_len: 512, pretty_repr: false, log_violations: true }
    }
}

impl ContractsConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse contracts config")
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read contracts config from {:?}", path))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from `path` when it exists, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => anyhow::bail!("Config file {:?} does not exist", path),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Serialize configuration to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize contracts config")
    }

    /// Get the default configuration path
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(".pactum/contracts.toml")
    }
}
