//! First-party plugins

pub mod caption;
pub mod replace;

use crate::plugin::error::PluginError;
use crate::plugin::registry::PluginFactories;
use crate::plugin::traits::Plugin;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Register every first-party plugin in `factories`
pub fn register_all(factories: &mut PluginFactories) {
    factories
        .register(caption::ID, false, |config| {
            let plugin = caption::Caption::new(parse_config(caption::ID, config)?);
            Ok(Arc::new(plugin) as Arc<dyn Plugin>)
        })
        .register(replace::ID, false, |config| {
            let plugin = replace::Replace::new(parse_config(replace::ID, config)?)?;
            Ok(Arc::new(plugin) as Arc<dyn Plugin>)
        });
}

/// Deserialize a plugin's configuration payload
pub(crate) fn parse_config<T: DeserializeOwned>(
    id: &str,
    config: &serde_json::Value,
) -> Result<T, PluginError> {
    serde_json::from_value(config.clone()).map_err(|e| PluginError::InvalidConfig {
        id: id.to_string(),
        reason: e.to_string(),
    })
}
