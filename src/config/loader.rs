//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (<config dir>/assetflow/config.toml)
//! 3. Project config (.assetflow/config.toml)
//! 4. Environment variables (ASSETFLOW_* prefix, `__` between sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{FlowError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // ASSETFLOW_UPLOAD__MAX_ATTEMPTS -> upload.max_attempts
        figment = figment.merge(Env::prefixed("ASSETFLOW_").split("__").lowercase(true));

        Self::extract(figment)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(FlowError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| FlowError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "assetflow").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".assetflow")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show the effective configuration (the auth token is never printed)
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        if as_json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| FlowError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            FlowError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        Self::write_template(&config_path, &Self::default_global_config(), force)?;

        Ok(config_path)
    }

    /// Initialize project configuration in `root`
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join("objects"))?;

        let config_path = project_dir.join("config.toml");
        Self::write_template(&config_path, &Self::default_project_config(), force)?;

        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn write_template(path: &Path, content: &str, force: bool) -> Result<()> {
        if !path.exists() || force {
            fs::write(path, content)?;
            info!("Created config: {}", path.display());
        } else {
            info!("Config exists: {}", path.display());
        }
        Ok(())
    }

    /// Generate default global config content (TOML)
    fn default_global_config() -> String {
        r#"# assetflow Global Configuration
# User-wide defaults. Project settings in .assetflow/config.toml override these.

version = "1.0"

# Inference collaborator
[inference]
# api_base = "https://generativelanguage.googleapis.com/v1beta"
text_model = "gemini-2.5-flash"
image_model = "gemini-2.5-flash-image"

# Shared retry backoff
[retry]
base_delay_ms = 500
backoff_factor = 2.0
max_delay_ms = 8000
"#
        .to_string()
    }

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# assetflow Project Configuration
# Project-specific settings that override global defaults.
# The bearer token is best supplied via ASSETFLOW_AUTH__TOKEN.

version = "1.0"

# Object storage: "none" (inline only), "local" or "http"
[storage]
backend = "local"
local_dir = ".assetflow/objects"
bucket = "item-images"

[upload]
timeout_ms = 30000
max_attempts = 3

[generation]
image_timeout_ms = 20000
augmented_timeout_ms = 22000
quick_timeout_ms = 10000
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_init_project_and_load() {
        let temp_dir = TempDir::new().unwrap();

        let path = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert!(path.exists());
        assert!(temp_dir.path().join(".assetflow/objects").exists());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.upload.max_attempts, 3);
    }

    #[test]
    fn test_init_project_keeps_existing_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        fs::write(&path, "version = \"2.0\"\n").unwrap();

        ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "version = \"2.0\"\n");

        ConfigLoader::init_project(temp_dir.path(), true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[storage]"));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[retry]\nbackoff_factor = 0.5\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(FlowError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = ConfigLoader::load_from_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(FlowError::Config(_))));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: This test runs in isolation
        unsafe {
            std::env::set_var("ASSETFLOW_INFERENCE__TEXT_MODEL", "test-model");
        }
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.inference.text_model, "test-model");
        unsafe {
            std::env::remove_var("ASSETFLOW_INFERENCE__TEXT_MODEL");
        }
    }
}
