//! Init Command
//!
//! Initialize assetflow in the current directory.

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::{FlowError, Result};

pub fn run(force: bool, output: &Output) -> Result<()> {
    let root = std::env::current_dir()?;
    let project_dir = root.join(ConfigLoader::project_dir());

    if project_dir.exists() && !force {
        return Err(FlowError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    ConfigLoader::init_project(&root, force)?;

    // Global config is optional; never overwrite it here
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    output.success("Initialized assetflow in .assetflow/");
    output.info("Objects are stored under .assetflow/objects (local backend)");
    output.info("Set ASSETFLOW_AUTH__TOKEN and inference.api_base before running 'assetflow generate'");
    Ok(())
}
