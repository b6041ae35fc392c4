//! One-time async initialization of loaded plugins

use crate::error::Result;
use crate::plugin::error::PluginError;
use crate::plugin::registry::PluginRegistry;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{error, info};

/// What happens when a plugin's async init fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitPolicy {
    /// Log the failure and start processing anyway
    #[default]
    Continue,
    /// Refuse to start
    Abort,
}

/// Result of running the init hooks
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    /// Ids whose hook completed
    pub initialized: Vec<String>,
    /// Ids whose hook failed, with the error message
    pub failed: Vec<(String, String)>,
}

/// A registry whose init hooks have all completed.
///
/// The pipeline only accepts this type, so no message can reach a plugin
/// before initialization is over.
#[derive(Debug)]
pub struct ReadyRegistry {
    registry: PluginRegistry,
    report: InitReport,
}

impl ReadyRegistry {
    pub fn report(&self) -> &InitReport {
        &self.report
    }

    pub fn into_inner(self) -> PluginRegistry {
        self.registry
    }
}

impl Deref for ReadyRegistry {
    type Target = PluginRegistry;

    fn deref(&self) -> &PluginRegistry {
        &self.registry
    }
}

/// Run `async_init` once for every loaded plugin flagged as needing it.
///
/// Hooks run concurrently and each is bounded by `timeout_ms` when given. All
/// hooks finish before this returns, whatever the policy.
pub async fn initialize(
    registry: PluginRegistry,
    policy: InitPolicy,
    timeout_ms: Option<u64>,
) -> Result<ReadyRegistry> {
    let pending = registry
        .iter()
        .filter(|loaded| loaded.requires_async_init)
        .map(|loaded| {
            let id = loaded.id.clone();
            let plugin = Arc::clone(&loaded.plugin);
            async move {
                let result = match timeout_ms {
                    Some(ms) => timeout(Duration::from_millis(ms), plugin.async_init())
                        .await
                        .unwrap_or(Err(PluginError::Timeout { timeout_ms: ms })),
                    None => plugin.async_init().await,
                };
                (id, result)
            }
        });

    let results = join_all(pending).await;

    let mut report = InitReport::default();
    for (id, result) in results {
        match result {
            Ok(()) => {
                info!(plugin = %id, "Plugin {} asynchronously loaded", id);
                report.initialized.push(id);
            }
            Err(e) => {
                error!(plugin = %id, error = %e, "Plugin async init failed");
                report.failed.push((id, e.to_string()));
            }
        }
    }

    if policy == InitPolicy::Abort {
        if let Some((id, reason)) = report.failed.first() {
            return Err(PluginError::InitFailed {
                id: id.clone(),
                reason: reason.clone(),
            }
            .into());
        }
    }

    Ok(ReadyRegistry { registry, report })
}
