//! Building an [`ExtensionManager`] from the command line.

use std::path::Path;

use extman_core::ExtensionManager;
use extman_extension::ConfigLoader;
use tracing::debug;

use crate::error::Result;

/// Load the configuration, apply environment overrides and build the manager.
///
/// Without `--config` the default location is used, and a missing default
/// file means an empty configuration.
pub fn load_manager(config: Option<&Path>) -> Result<ExtensionManager> {
    let mut config = ConfigLoader::new().load(config)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    debug!(?config, "Loaded configuration");
    Ok(ExtensionManager::from_config(&config)?)
}
