//! Plugin-layer errors

use crate::error::TransportError;
use thiserror::Error;

/// Errors raised by plugins while constructing, initializing or modifying.
#[derive(Debug, Error)]
pub enum PluginError {
    /// File retrieval was requested on a message that carries no media
    #[error("No file exists in this message")]
    NoFile,

    /// Plugin rejected its configuration payload
    #[error("Invalid configuration for plugin '{id}': {reason}")]
    InvalidConfig { id: String, reason: String },

    /// One-time async setup failed
    #[error("Async init of plugin '{id}' failed: {reason}")]
    InitFailed { id: String, reason: String },

    /// A plugin step exceeded its time budget
    #[error("Plugin timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Follow-up transport operation failed
    #[error("Plugin transport error: {0}")]
    Transport(#[from] TransportError),

    /// Plugin I/O error
    #[error("Plugin I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons a configured plugin was left out of the registry.
///
/// None of these are fatal: the registry is still built from the remaining
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("{id} is not a known plugin")]
    Unresolved { id: String },

    #[error("Plugin {id} could not be constructed: {reason}")]
    Construct { id: String, reason: String },

    #[error("Plugin id for {expected} does not match expected id (reported {actual})")]
    IdMismatch { expected: String, actual: String },

    #[error("Plugin {id} is configured more than once")]
    Duplicate { id: String },
}

impl LoadError {
    /// Configured id the error is attributed to
    pub fn id(&self) -> &str {
        match self {
            LoadError::Unresolved { id }
            | LoadError::Construct { id, .. }
            | LoadError::Duplicate { id } => id,
            LoadError::IdMismatch { expected, .. } => expected,
        }
    }
}
