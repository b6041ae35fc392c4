//! Per-message plugin execution
//!
//! This module applies the loaded plugins to one message at a time.

use crate::media::MediaFiles;
use crate::metrics::Metrics;
use crate::plugin::envelope::Envelope;
use crate::plugin::init::ReadyRegistry;
use crate::plugin::traits::Verdict;
use crate::transport::SourceMessage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};

/// Runs messages through every loaded plugin in configuration order.
///
/// The pipeline is shared freely between concurrent message tasks; it holds
/// no per-message state.
pub struct Pipeline {
    registry: Arc<ReadyRegistry>,
    media: Arc<dyn MediaFiles>,
    download_dir: PathBuf,
    metrics: Option<Arc<Metrics>>,
}

impl Pipeline {
    pub fn new(
        registry: ReadyRegistry,
        media: Arc<dyn MediaFiles>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            media,
            download_dir: download_dir.into(),
            metrics: None,
        }
    }

    /// Record executions into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &ReadyRegistry {
        &self.registry
    }

    /// Apply all plugins to `message`.
    ///
    /// Returns `None` when a plugin stopped the message; the envelope has
    /// already been released in that case. A plugin that fails is logged and
    /// skipped, and the envelope continues exactly as it was before that
    /// plugin ran.
    pub async fn apply(&self, message: Arc<dyn SourceMessage>) -> Option<Envelope> {
        let start = Instant::now();
        let message_id = message.id();
        let mut envelope = Envelope::new(message, Arc::clone(&self.media), &self.download_dir);

        if let Some(metrics) = &self.metrics {
            metrics.record_message();
        }

        debug!(
            message_id,
            file_kind = %envelope.file_kind(),
            plugins = self.registry.len(),
            "Applying plugins"
        );

        for loaded in self.registry.iter() {
            let snapshot = envelope.snapshot();
            let span = tracing::info_span!(
                "plugin_execution",
                plugin = %loaded.id,
                message_id,
            );

            let plugin_start = Instant::now();
            let result = loaded
                .plugin
                .modify(&mut envelope)
                .instrument(span)
                .await;

            if let Some(metrics) = &self.metrics {
                let elapsed = plugin_start.elapsed();
                metrics.record_plugin_execution(&loaded.id, elapsed, result.is_ok());
            }

            match result {
                Ok(Verdict::Forward) => {
                    info!(plugin = %loaded.id, message_id, "Applied plugin {}", loaded.id);
                }
                Ok(Verdict::Stop) => {
                    info!(
                        plugin = %loaded.id,
                        message_id,
                        "Plugin {} stopped the message", loaded.id
                    );
                    envelope.clear();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_message_outcome(false, start.elapsed());
                    }
                    return None;
                }
                Err(e) => {
                    error!(
                        plugin = %loaded.id,
                        message_id,
                        error = %e,
                        "Failed to apply plugin {}", loaded.id
                    );
                    envelope.restore(snapshot);
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_message_outcome(true, start.elapsed());
        }

        Some(envelope)
    }
}
