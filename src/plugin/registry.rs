//! Plugin registry
//!
//! Resolves configured plugin ids against a table of factories and builds the
//! ordered set of live plugin instances the pipeline runs.

use crate::plugin::builtin;
use crate::plugin::config::PluginEntry;
use crate::plugin::error::{LoadError, PluginError};
use crate::plugin::traits::Plugin;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Builds a plugin instance from its configuration payload
pub type PluginFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;

#[derive(Clone)]
struct FactoryEntry {
    requires_async_init: bool,
    build: PluginFactory,
}

/// Registration table mapping plugin ids to factories
#[derive(Clone, Default)]
pub struct PluginFactories {
    entries: HashMap<String, FactoryEntry>,
}

impl PluginFactories {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every first-party plugin registered
    pub fn builtin() -> Self {
        let mut factories = Self::new();
        builtin::register_all(&mut factories);
        factories
    }

    /// Register a factory under `id`, replacing any earlier registration.
    ///
    /// `requires_async_init` is a property of the id, not of an instance.
    pub fn register<F>(
        &mut self,
        id: impl Into<String>,
        requires_async_init: bool,
        build: F,
    ) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync + 'static,
    {
        self.entries.insert(
            id.into(),
            FactoryEntry {
                requires_async_init,
                build: Arc::new(build),
            },
        );
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn requires_async_init(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.requires_async_init)
            .unwrap_or(false)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for PluginFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactories")
            .field("ids", &self.ids())
            .finish()
    }
}

/// A plugin that made it into the registry
#[derive(Clone)]
pub struct LoadedPlugin {
    pub id: String,
    pub requires_async_init: bool,
    pub plugin: Arc<dyn Plugin>,
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("id", &self.id)
            .field("requires_async_init", &self.requires_async_init)
            .finish()
    }
}

/// Ordered, read-only set of loaded plugins.
///
/// Iteration order equals configuration order and is the order the pipeline
/// applies plugins in.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<LoadedPlugin>,
    load_errors: Vec<LoadError>,
}

impl PluginRegistry {
    /// Load every enabled entry, in order.
    ///
    /// Entries that cannot be loaded are logged, recorded in
    /// [`load_errors`](Self::load_errors) and skipped. The build itself never
    /// fails.
    pub fn build(entries: &[PluginEntry], factories: &PluginFactories) -> Self {
        let mut registry = Self::default();

        for entry in entries {
            if !entry.enabled {
                debug!(plugin = %entry.id, "Plugin disabled, skipping");
                continue;
            }

            match registry.load(entry, factories) {
                Ok(loaded) => {
                    info!(plugin = %loaded.id, "Loaded plugin {}", loaded.id);
                    registry.plugins.push(loaded);
                }
                Err(e) => {
                    error!(plugin = %entry.id, "{}", e);
                    registry.load_errors.push(e);
                }
            }
        }

        info!(
            loaded = registry.plugins.len(),
            failed = registry.load_errors.len(),
            "Plugin registry built"
        );
        registry
    }

    fn load(
        &self,
        entry: &PluginEntry,
        factories: &PluginFactories,
    ) -> Result<LoadedPlugin, LoadError> {
        if self.get(&entry.id).is_some() {
            return Err(LoadError::Duplicate {
                id: entry.id.clone(),
            });
        }

        let factory = factories
            .entries
            .get(&entry.id)
            .ok_or_else(|| LoadError::Unresolved {
                id: entry.id.clone(),
            })?;

        let plugin = (factory.build)(&entry.config).map_err(|e| LoadError::Construct {
            id: entry.id.clone(),
            reason: e.to_string(),
        })?;

        if plugin.id() != entry.id {
            return Err(LoadError::IdMismatch {
                expected: entry.id.clone(),
                actual: plugin.id().to_string(),
            });
        }

        Ok(LoadedPlugin {
            id: entry.id.clone(),
            requires_async_init: factory.requires_async_init,
            plugin,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|loaded| loaded.id == id)
            .map(|loaded| &loaded.plugin)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.plugins.iter()
    }

    /// Loaded ids in execution order
    pub fn ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|loaded| loaded.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn load_errors(&self) -> &[LoadError] {
        &self.load_errors
    }
}
