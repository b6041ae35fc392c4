//! JSON-lines harness standing in for a chat transport
//!
//! Each stdin line is one incoming message:
//!
//! ```json
//! {"id": 7, "text": "hello", "senderId": 42, "media": {"photo": "/tmp/cat.jpg"}}
//! ```
//!
//! Every forwarded message is written to stdout as one JSON line. Media
//! "downloads" are copies of the local paths named in `media`.

use crate::error::{Result, TransportError};
use crate::plugin::{Envelope, FileKind};
use crate::relay::{ForwardOutcome, Forwarder};
use crate::transport::{Delivery, SourceMessage, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// One message as read from stdin
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    /// Defaults to `text`
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub sender_id: i64,
    #[serde(default)]
    pub media: HashMap<FileKind, PathBuf>,
}

pub struct StdioMessage {
    incoming: IncomingMessage,
    transport: Weak<dyn Transport>,
}

impl SourceMessage for StdioMessage {
    fn id(&self) -> i64 {
        self.incoming.id
    }

    fn text(&self) -> &str {
        &self.incoming.text
    }

    fn raw_text(&self) -> &str {
        self.incoming
            .raw_text
            .as_deref()
            .unwrap_or(&self.incoming.text)
    }

    fn sender_id(&self) -> i64 {
        self.incoming.sender_id
    }

    fn has_media(&self, kind: FileKind) -> bool {
        self.incoming.media.contains_key(&kind)
    }

    fn transport(&self) -> Weak<dyn Transport> {
        self.transport.clone()
    }
}

/// Transport whose media lives on the local file system
#[derive(Default)]
pub struct StdioTransport {
    media: Mutex<HashMap<i64, PathBuf>>,
}

impl StdioTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wrap an incoming message, remembering where its media lives
    pub fn accept(self: &Arc<Self>, incoming: IncomingMessage) -> Arc<dyn SourceMessage> {
        let source = FileKind::MEDIA
            .into_iter()
            .find_map(|kind| incoming.media.get(&kind).cloned());
        if let Some(path) = source {
            if let Ok(mut media) = self.media.lock() {
                media.insert(incoming.id, path);
            }
        }

        let transport: Arc<dyn Transport> = self.clone();
        Arc::new(StdioMessage {
            incoming,
            transport: Arc::downgrade(&transport),
        })
    }

    /// Drop what is remembered about message `id` once it has been handled
    pub fn forget(&self, id: i64) {
        if let Ok(mut media) = self.media.lock() {
            media.remove(&id);
        }
    }

    /// Number of messages whose media location is still remembered
    pub fn pending(&self) -> usize {
        self.media.lock().map(|media| media.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn name(&self) -> &str {
        "stdio"
    }

    async fn download_media(
        &self,
        message: &dyn SourceMessage,
        dir: &Path,
    ) -> std::result::Result<PathBuf, TransportError> {
        let source = self
            .media
            .lock()
            .ok()
            .and_then(|media| media.get(&message.id()).cloned())
            .ok_or_else(|| {
                TransportError::DownloadFailed(format!("message {} has no media", message.id()))
            })?;

        let file_name = source.file_name().ok_or_else(|| {
            TransportError::DownloadFailed(format!("invalid media path {}", source.display()))
        })?;
        let target = dir.join(file_name);

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| TransportError::DownloadFailed(e.to_string()))?;
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| TransportError::DownloadFailed(e.to_string()))?;

        debug!("Copied {} to {}", source.display(), target.display());
        Ok(target)
    }
}

/// One forwarded message as written to stdout
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingMessage<'a> {
    id: i64,
    text: &'a str,
    file_kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<i64>,
}

/// Writes delivered envelopes to stdout
pub struct StdoutDelivery {
    stdout: tokio::sync::Mutex<tokio::io::Stdout>,
}

impl StdoutDelivery {
    pub fn new() -> Self {
        Self {
            stdout: tokio::sync::Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Delivery for StdoutDelivery {
    async fn deliver(&self, envelope: &Envelope) -> std::result::Result<(), TransportError> {
        let outgoing = OutgoingMessage {
            id: envelope.source().id(),
            text: &envelope.text,
            file_kind: envelope.file_kind(),
            file: envelope.replacement_file(),
            reply_to: envelope.reply_to,
        };
        let mut line = serde_json::to_string(&outgoing)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Counts of what happened to the messages of one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub delivered: usize,
    pub vetoed: usize,
    pub failed: usize,
    pub malformed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &ForwardOutcome) {
        match outcome {
            ForwardOutcome::Delivered => self.delivered += 1,
            ForwardOutcome::Vetoed => self.vetoed += 1,
            ForwardOutcome::TimedOut | ForwardOutcome::DeliveryFailed(_) => self.failed += 1,
        }
    }
}

/// Forward every message read from stdin, one at a time, until EOF or until
/// `shutdown` resolves.
///
/// Returns `None` when the run was cut short by `shutdown`.
pub async fn run_until<F>(
    forwarder: &Forwarder,
    transport: &Arc<StdioTransport>,
    shutdown: F,
) -> Result<Option<RunSummary>>
where
    F: Future<Output = ()>,
{
    let stdin = BufReader::new(tokio::io::stdin());
    forward_until(forwarder, transport, stdin, shutdown).await
}

async fn forward_until<R, F>(
    forwarder: &Forwarder,
    transport: &Arc<StdioTransport>,
    reader: R,
    shutdown: F,
) -> Result<Option<RunSummary>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        summary = forward_lines(forwarder, transport, reader) => summary.map(Some),
        _ = shutdown => {
            info!("Received shutdown signal");
            Ok(None)
        }
    }
}

async fn forward_lines<R>(
    forwarder: &Forwarder,
    transport: &Arc<StdioTransport>,
    reader: R,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = RunSummary::default();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let incoming: IncomingMessage = match serde_json::from_str(&line) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("Skipping malformed message: {}", e);
                summary.malformed += 1;
                continue;
            }
        };

        let id = incoming.id;
        let outcome = forwarder.forward(transport.accept(incoming)).await;
        transport.forget(id);
        summary.record(&outcome);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_incoming_defaults() {
        let incoming: IncomingMessage =
            serde_json::from_value(json!({ "id": 3, "text": "*hi*", "rawText": "hi" })).unwrap();
        let transport = StdioTransport::new();
        let message = transport.accept(incoming);

        assert_eq!(message.text(), "*hi*");
        assert_eq!(message.raw_text(), "hi");
        assert_eq!(message.sender_id(), 0);
        assert_eq!(FileKind::detect(message.as_ref()), FileKind::NoFile);
    }

    #[test]
    fn test_media_keys() {
        let incoming: IncomingMessage = serde_json::from_value(json!({
            "id": 1,
            "media": { "video_note": "/tmp/v.mp4", "document": "/tmp/d.pdf" }
        }))
        .unwrap();
        let transport = StdioTransport::new();
        let message = transport.accept(incoming);

        assert_eq!(FileKind::detect(message.as_ref()), FileKind::VideoNote);
    }

    #[tokio::test]
    async fn test_download_copies_file() {
        let source_dir = TempDir::new().unwrap();
        let download_dir = TempDir::new().unwrap();
        let source = source_dir.path().join("cat.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let transport = StdioTransport::new();
        let message = transport.accept(IncomingMessage {
            id: 9,
            text: String::new(),
            raw_text: None,
            sender_id: 1,
            media: HashMap::from([(FileKind::Photo, source.clone())]),
        });

        let target = transport
            .download_media(message.as_ref(), &download_dir.path().join("inbox"))
            .await
            .unwrap();

        assert_eq!(target, download_dir.path().join("inbox").join("cat.jpg"));
        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_download_without_media() {
        let transport = StdioTransport::new();
        let message = transport.accept(IncomingMessage {
            id: 2,
            text: "plain".to_string(),
            raw_text: None,
            sender_id: 1,
            media: HashMap::new(),
        });

        let result = transport
            .download_media(message.as_ref(), Path::new("downloads"))
            .await;
        assert!(matches!(result, Err(TransportError::DownloadFailed(_))));
    }

    #[test]
    fn test_forget_drops_media_location() {
        let transport = StdioTransport::new();
        for id in 0..100 {
            transport.accept(IncomingMessage {
                id,
                text: String::new(),
                raw_text: None,
                sender_id: 1,
                media: HashMap::from([(FileKind::Photo, PathBuf::from("/tmp/p.jpg"))]),
            });
        }
        assert_eq!(transport.pending(), 100);

        for id in 0..100 {
            transport.forget(id);
        }
        assert_eq!(transport.pending(), 0);
    }

    #[derive(Default)]
    struct Collect {
        texts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Delivery for Collect {
        async fn deliver(&self, envelope: &Envelope) -> std::result::Result<(), TransportError> {
            self.texts.lock().unwrap().push(envelope.text.clone());
            Ok(())
        }
    }

    async fn passthrough(delivery: Arc<Collect>) -> Forwarder {
        use crate::plugin::{initialize, InitPolicy, Pipeline, PluginFactories, PluginRegistry};
        use crate::test_utils::CountingMedia;

        let registry = PluginRegistry::build(&[], &PluginFactories::new());
        let ready = initialize(registry, InitPolicy::Continue, None).await.unwrap();
        let pipeline = Pipeline::new(ready, Arc::new(CountingMedia::default()), "downloads");
        Forwarder::new(Arc::new(pipeline), delivery)
    }

    #[tokio::test]
    async fn test_forward_lines_leaves_nothing_behind() {
        let delivery = Arc::new(Collect::default());
        let forwarder = passthrough(delivery.clone()).await;
        let transport = StdioTransport::new();

        let input = concat!(
            r#"{"id": 1, "text": "one", "media": {"photo": "/tmp/a.jpg"}}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"id": 2, "text": "two", "media": {"document": "/tmp/b.pdf"}}"#,
            "\n",
        );
        let summary = forward_lines(&forwarder, &transport, input.as_bytes())
            .await
            .unwrap();

        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(*delivery.texts.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(transport.pending(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_run_without_error() {
        let forwarder = passthrough(Arc::new(Collect::default())).await;
        let transport = StdioTransport::new();
        // The writer half stays open, so the reader never reaches EOF
        let (_writer, reader) = tokio::io::duplex(64);

        let result = forward_until(&forwarder, &transport, BufReader::new(reader), async {})
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_eof_finishes_before_shutdown() {
        let forwarder = passthrough(Arc::new(Collect::default())).await;
        let transport = StdioTransport::new();
        let input = "{\"id\": 5, \"text\": \"last\"}\n";

        let result = forward_until(
            &forwarder,
            &transport,
            input.as_bytes(),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(result.map(|summary| summary.delivered), Some(1));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record(&ForwardOutcome::Delivered);
        summary.record(&ForwardOutcome::Vetoed);
        summary.record(&ForwardOutcome::TimedOut);
        summary.record(&ForwardOutcome::DeliveryFailed("x".into()));

        assert_eq!(
            summary,
            RunSummary {
                delivered: 1,
                vetoed: 1,
                failed: 2,
                malformed: 0,
            }
        );
    }
}
