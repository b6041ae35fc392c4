use crate::error::TransportError;
use crate::media::MediaFiles;
use crate::plugin::{Envelope, FileKind, Plugin, PluginError, Verdict};
use crate::transport::{SourceMessage, Transport};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

pub struct FakeMessage {
    pub id: i64,
    pub text: String,
    pub sender_id: i64,
    pub media: HashSet<FileKind>,
    pub transport: Weak<dyn Transport>,
}

impl FakeMessage {
    pub fn new(sender_id: i64, text: &str) -> Self {
        let transport: Weak<FakeTransport> = Weak::new();
        Self {
            id: 1,
            text: text.to_string(),
            sender_id,
            media: HashSet::new(),
            transport,
        }
    }

    pub fn with_media(mut self, kind: FileKind) -> Self {
        self.media.insert(kind);
        self
    }

    pub fn with_transport(mut self, transport: &Arc<dyn Transport>) -> Self {
        self.transport = Arc::downgrade(transport);
        self
    }
}

impl SourceMessage for FakeMessage {
    fn id(&self) -> i64 {
        self.id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn raw_text(&self) -> &str {
        &self.text
    }

    fn sender_id(&self) -> i64 {
        self.sender_id
    }

    fn has_media(&self, kind: FileKind) -> bool {
        self.media.contains(&kind)
    }

    fn transport(&self) -> Weak<dyn Transport> {
        self.transport.clone()
    }
}

/// Writes a file named `file_name` into the download directory
pub struct FakeTransport {
    file_name: String,
    downloads: AtomicUsize,
}

impl FakeTransport {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &str {
        "fake"
    }

    async fn download_media(
        &self,
        _message: &dyn SourceMessage,
        dir: &Path,
    ) -> Result<PathBuf, TransportError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, b"media")
            .await
            .map_err(|e| TransportError::DownloadFailed(e.to_string()))?;
        Ok(path)
    }
}

/// Records cleanups instead of touching the file system
#[derive(Default)]
pub struct CountingMedia {
    cleaned: Mutex<Vec<PathBuf>>,
}

impl CountingMedia {
    pub fn cleaned(&self) -> Vec<PathBuf> {
        self.cleaned.lock().unwrap().clone()
    }
}

impl MediaFiles for CountingMedia {
    fn stamp(&self, path: &Path, sender_id: i64) -> PathBuf {
        let name = path.file_name().unwrap().to_string_lossy();
        path.with_file_name(format!("stamped-{sender_id}-{name}"))
    }

    fn cleanup(&self, path: &Path) {
        self.cleaned.lock().unwrap().push(path.to_path_buf());
    }
}

/// Appends its id to a shared log and optionally fails or stops
pub struct MarkerPlugin {
    pub id: String,
    pub log: Arc<Mutex<Vec<String>>>,
    pub behavior: MarkerBehavior,
}

#[derive(Clone, Copy)]
pub enum MarkerBehavior {
    Append,
    Fail,
    Stop,
}

impl MarkerPlugin {
    pub fn new(id: &str, log: &Arc<Mutex<Vec<String>>>, behavior: MarkerBehavior) -> Self {
        Self {
            id: id.to_string(),
            log: Arc::clone(log),
            behavior,
        }
    }
}

#[async_trait]
impl Plugin for MarkerPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        self.log.lock().unwrap().push(self.id.clone());
        envelope.text.push_str(&format!("[{}]", self.id));
        match self.behavior {
            MarkerBehavior::Append => Ok(Verdict::Forward),
            MarkerBehavior::Fail => Err(anyhow::anyhow!("{} failed", self.id).into()),
            MarkerBehavior::Stop => Ok(Verdict::Stop),
        }
    }
}
