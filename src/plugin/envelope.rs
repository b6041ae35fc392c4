//! Per-message state carried through the plugin chain

use crate::error::TransportError;
use crate::media::MediaFiles;
use crate::plugin::error::PluginError;
use crate::transport::{SourceMessage, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Media category carried by a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Audio,
    Gif,
    Video,
    VideoNote,
    Sticker,
    Contact,
    Photo,
    Document,
    #[serde(rename = "nofile")]
    NoFile,
}

impl FileKind {
    /// Concrete media kinds in detection priority order
    pub const MEDIA: [FileKind; 8] = [
        FileKind::Audio,
        FileKind::Gif,
        FileKind::Video,
        FileKind::VideoNote,
        FileKind::Sticker,
        FileKind::Contact,
        FileKind::Photo,
        FileKind::Document,
    ];

    pub fn is_media(self) -> bool {
        self != FileKind::NoFile
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Audio => "audio",
            FileKind::Gif => "gif",
            FileKind::Video => "video",
            FileKind::VideoNote => "video_note",
            FileKind::Sticker => "sticker",
            FileKind::Contact => "contact",
            FileKind::Photo => "photo",
            FileKind::Document => "document",
            FileKind::NoFile => "nofile",
        }
    }

    /// Classify the media carried by `message`.
    ///
    /// Only concrete kinds are probed; `NoFile` is the fallback once all of
    /// them are absent, never a candidate in the scan.
    pub fn detect(message: &dyn SourceMessage) -> FileKind {
        Self::MEDIA
            .into_iter()
            .find(|kind| message.has_media(*kind))
            .unwrap_or(FileKind::NoFile)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable part of an envelope, captured before each plugin runs so that a
/// failing plugin can be rolled back.
#[derive(Debug, Clone)]
pub(crate) struct EnvelopeState {
    text: String,
    replacement_file: Option<PathBuf>,
    delete_replacement_on_finish: bool,
    reply_to: Option<i64>,
    retired: usize,
}

/// Forwarding state for one message.
///
/// Dropping the envelope releases an owned replacement file, so a file is
/// removed exactly once whether the message was delivered or stopped.
pub struct Envelope {
    source: Arc<dyn SourceMessage>,
    /// Text to forward; plugins may rewrite it freely
    pub text: String,
    raw_text: String,
    sender_id: i64,
    file_kind: FileKind,
    replacement_file: Option<PathBuf>,
    delete_replacement_on_finish: bool,
    /// Message to reply to in the destination chat
    pub reply_to: Option<i64>,
    transport: Weak<dyn Transport>,
    media: Arc<dyn MediaFiles>,
    download_dir: PathBuf,
    downloaded_file: Option<PathBuf>,
    /// Owned replacement files superseded by a later replacement
    retired: Vec<PathBuf>,
    /// Files already handed to `MediaFiles::cleanup`
    released: Vec<PathBuf>,
}

impl Envelope {
    pub fn new(
        source: Arc<dyn SourceMessage>,
        media: Arc<dyn MediaFiles>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        let file_kind = FileKind::detect(source.as_ref());
        Self {
            text: source.text().to_string(),
            raw_text: source.raw_text().to_string(),
            sender_id: source.sender_id(),
            file_kind,
            replacement_file: None,
            delete_replacement_on_finish: false,
            reply_to: None,
            transport: source.transport(),
            source,
            media,
            download_dir: download_dir.into(),
            downloaded_file: None,
            retired: Vec::new(),
            released: Vec::new(),
        }
    }

    /// Original message as received from the transport
    pub fn source(&self) -> &dyn SourceMessage {
        self.source.as_ref()
    }

    /// Unmodified original text
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn sender_id(&self) -> i64 {
        self.sender_id
    }

    pub fn file_kind(&self) -> FileKind {
        self.file_kind
    }

    pub fn replacement_file(&self) -> Option<&Path> {
        self.replacement_file.as_deref()
    }

    pub fn delete_replacement_on_finish(&self) -> bool {
        self.delete_replacement_on_finish
    }

    /// Substitute `path` for the original media.
    ///
    /// With `delete_on_finish` the envelope takes ownership of the file and
    /// removes it when released. An earlier owned replacement stays owned by
    /// the envelope and is removed on release as well.
    pub fn set_replacement(&mut self, path: impl Into<PathBuf>, delete_on_finish: bool) {
        let path = path.into();
        if let Some(previous) = self.replacement_file.take() {
            if self.delete_replacement_on_finish && previous != path {
                self.retired.push(previous);
            }
        }
        if delete_on_finish {
            self.released.retain(|released| *released != path);
        }
        self.replacement_file = Some(path);
        self.delete_replacement_on_finish = delete_on_finish;
    }

    /// Download the media of the original message and return its local path.
    ///
    /// The download happens once; later calls return the cached path.
    pub async fn get_file(&mut self) -> Result<PathBuf, PluginError> {
        if !self.file_kind.is_media() {
            return Err(PluginError::NoFile);
        }
        if let Some(path) = &self.downloaded_file {
            return Ok(path.clone());
        }

        let transport = self.transport.upgrade().ok_or(TransportError::Closed)?;
        let downloaded = transport
            .download_media(self.source.as_ref(), &self.download_dir)
            .await?;
        let path = self.media.stamp(&downloaded, self.sender_id);
        debug!(
            message_id = self.source.id(),
            path = %path.display(),
            "Downloaded message media"
        );

        self.downloaded_file = Some(path.clone());
        Ok(path)
    }

    /// Release the replacement file if the envelope owns it, and reset both
    /// replacement fields. Safe to call more than once.
    pub fn clear(&mut self) {
        for path in std::mem::take(&mut self.retired) {
            self.release(path);
        }
        if let Some(path) = self.replacement_file.take() {
            if self.delete_replacement_on_finish {
                self.release(path);
            }
        }
        self.delete_replacement_on_finish = false;
    }

    fn release(&mut self, path: PathBuf) {
        if self.released.contains(&path) {
            return;
        }
        self.media.cleanup(&path);
        self.released.push(path);
    }

    pub(crate) fn snapshot(&self) -> EnvelopeState {
        EnvelopeState {
            text: self.text.clone(),
            replacement_file: self.replacement_file.clone(),
            delete_replacement_on_finish: self.delete_replacement_on_finish,
            reply_to: self.reply_to,
            retired: self.retired.len(),
        }
    }

    /// Roll back to `state`, releasing any owned file attached since.
    pub(crate) fn restore(&mut self, state: EnvelopeState) {
        let keep = state.retired.min(self.retired.len());
        let retired_since: Vec<PathBuf> = self.retired.drain(keep..).collect();
        for path in retired_since {
            if state.replacement_file.as_ref() != Some(&path) {
                self.release(path);
            }
        }
        if let Some(current) = self.replacement_file.take() {
            let kept = state.replacement_file.as_ref() == Some(&current);
            if self.delete_replacement_on_finish && !kept {
                self.release(current);
            }
        }

        // A file released since the snapshot no longer exists; never hand it
        // back out or release it again.
        let (replacement_file, delete_on_finish) = match state.replacement_file {
            Some(path) if self.released.contains(&path) => (None, false),
            other => (other, state.delete_replacement_on_finish),
        };

        self.text = state.text;
        self.replacement_file = replacement_file;
        self.delete_replacement_on_finish = delete_on_finish;
        self.reply_to = state.reply_to;
    }
}

impl Drop for Envelope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("message_id", &self.source.id())
            .field("text", &self.text)
            .field("sender_id", &self.sender_id)
            .field("file_kind", &self.file_kind)
            .field("replacement_file", &self.replacement_file)
            .field("delete_replacement_on_finish", &self.delete_replacement_on_finish)
            .field("reply_to", &self.reply_to)
            .finish()
    }
}
