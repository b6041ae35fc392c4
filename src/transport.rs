//! Boundary to the chat transport
//!
//! The transport client itself (connection, authentication, retrieving and
//! sending messages) lives outside this crate. These traits are the only
//! surface the plugin pipeline relies on.

use crate::error::TransportError;
use crate::plugin::{Envelope, FileKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Weak;

/// Read-only handle to a message received from the transport
pub trait SourceMessage: Send + Sync {
    /// Transport-assigned message id
    fn id(&self) -> i64;

    /// Text with formatting entities applied
    fn text(&self) -> &str;

    /// Text without formatting
    fn raw_text(&self) -> &str;

    fn sender_id(&self) -> i64;

    /// Whether the media field for `kind` is populated
    fn has_media(&self, kind: FileKind) -> bool;

    /// Session the message arrived on. The envelope never keeps it alive.
    fn transport(&self) -> Weak<dyn Transport>;
}

/// Session used for follow-up operations on a received message
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Download the media of `message` into `dir` and return the file path
    async fn download_media(
        &self,
        message: &dyn SourceMessage,
        dir: &Path,
    ) -> Result<PathBuf, TransportError>;
}

/// Sends a processed envelope to its destination(s)
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> Result<(), TransportError>;
}
