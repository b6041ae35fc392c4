use crate::config::Config;
use crate::error::{ConfigError, RelayError, Result};
use crate::plugin::{PluginFactories, PluginRegistry};
use tracing::{error, info, warn};

/// Validate the configuration and try to load every configured plugin.
///
/// Plugins are constructed but not initialized, so no network or file I/O
/// happens here.
pub async fn run_config_check(config: &Config, factories: &PluginFactories) -> Result<()> {
    info!("Checking configuration...");

    crate::config::validate(config)?;
    info!("✓ Configuration is valid");

    info!("Checking {} plugin(s)...", config.plugins.len());
    for entry in config.plugins.iter().filter(|entry| !entry.enabled) {
        info!("  - {} (disabled)", entry.id);
    }

    let registry = PluginRegistry::build(&config.plugins, factories);
    for loaded in registry.iter() {
        let init = if loaded.requires_async_init {
            " (async init)"
        } else {
            ""
        };
        info!("  ✓ {}{}", loaded.id, init);
    }
    for load_error in registry.load_errors() {
        error!("  ✗ {}", load_error);
    }

    if registry.is_empty() {
        warn!("No plugins loaded; messages will be forwarded unchanged");
    }

    if registry.load_errors().is_empty() {
        info!("✓ All checks passed");
        Ok(())
    } else {
        Err(RelayError::Config(ConfigError::Validation(format!(
            "{} plugin(s) failed to load",
            registry.load_errors().len()
        ))))
    }
}
