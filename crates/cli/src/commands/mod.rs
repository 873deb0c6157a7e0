//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use contracts::AppConfig;

use crate::error::CliError;

/// Load and validate a configuration file
fn load_config(path: &Path) -> Result<AppConfig, CliError> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path).map_err(CliError::Config)
}
