//! Plugin configuration types
//!
//! This module defines the configured plugin entries and the pipeline
//! settings that control initialization and per-message processing.

use crate::plugin::init::InitPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// One configured plugin. Position in the list is execution order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEntry {
    /// Identifier the plugin is registered under
    pub id: String,

    /// Whether this plugin is loaded at all
    #[serde(default = "default_enabled", alias = "check")]
    pub enabled: bool,

    /// Plugin-specific payload, handed to the plugin factory untouched
    #[serde(default = "default_plugin_config")]
    pub config: serde_json::Value,
}

impl PluginEntry {
    pub fn new(id: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            config,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Settings for the async initializer and the executor
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Where lazily downloaded media is stored
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// What to do when a plugin's async init fails
    #[serde(default)]
    pub init_policy: InitPolicy,

    /// Upper bound for each async init hook (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_timeout_ms: Option<u64>,

    /// Upper bound for running one message through the chain (milliseconds).
    /// Applied by the forwarder, not by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timeout_ms: Option<u64>,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_enabled() -> bool {
    true
}

fn default_plugin_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            init_policy: InitPolicy::default(),
            init_timeout_ms: None,
            message_timeout_ms: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.download_dir.as_os_str().is_empty() {
            return Err("downloadDir must not be empty".to_string());
        }

        if self.init_timeout_ms == Some(0) {
            return Err("initTimeoutMs must be greater than 0".to_string());
        }

        if self.message_timeout_ms == Some(0) {
            return Err("messageTimeoutMs must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Validate a list of plugin entries.
///
/// Duplicate ids are reported here so `check` can flag them; the registry
/// itself tolerates them by keeping the first.
pub fn validate_plugin_list(plugins: &[PluginEntry]) -> Result<(), String> {
    let mut seen_ids = HashSet::new();
    for plugin in plugins {
        if plugin.id.trim().is_empty() {
            return Err("Plugin id must not be empty".to_string());
        }

        if plugin.enabled && !seen_ids.insert(plugin.id.as_str()) {
            return Err(format!("Duplicate plugin '{}'", plugin.id));
        }
    }

    Ok(())
}
