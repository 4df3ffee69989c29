//! Config command handler

use anyhow::Result;
use pactum_core::ContractsConfig;
use std::path::Path;
use tracing::debug;

/// Print the configuration contracted callables would be built with
pub fn execute(path: Option<&Path>) -> Result<()> {
    let source = match path {
        Some(path) => path.display().to_string(),
        None if ContractsConfig::default_config_path().exists() => {
            ContractsConfig::default_config_path().display().to_string()
        }
        None => "built-in defaults".to_string(),
    };
    debug!("Loading contracts config from {}", source);

    let config = ContractsConfig::load_or_default(path)?;
    println!("# source: {}", source);
    print!("{}", config.to_toml_string()?);
    Ok(())
}
