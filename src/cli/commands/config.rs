//! Config Command
//!
//! Manage assetflow configuration.
//!
//! Usage:
//!   assetflow config show [-f json|toml]
//!   assetflow config path
//!   assetflow config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::types::{FlowError, Result};

/// Show the merged effective configuration
pub fn show(config: &Config, format: &str) -> Result<()> {
    match format {
        "json" => ConfigLoader::show_config(config, true),
        "toml" => ConfigLoader::show_config(config, false),
        other => Err(FlowError::validation(
            "format",
            format!("unknown format '{}'. Valid values: json, toml", other),
        )),
    }
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool, output: &Output) -> Result<()> {
    let path = ConfigLoader::init_global(force)?;
    output.success("Initialized global configuration");
    output.info(&format!("Config: {}", path.display()));
    Ok(())
}

/// Initialize project configuration in the current directory
pub fn init_project(force: bool, output: &Output) -> Result<()> {
    let root = std::env::current_dir()?;
    let path = ConfigLoader::init_project(&root, force)?;
    output.success("Initialized project configuration");
    output.info(&format!("Config: {}", path.display()));
    Ok(())
}
