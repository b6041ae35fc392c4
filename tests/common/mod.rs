//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chat_relay::error::TransportError;
use chat_relay::plugin::{Envelope, FileKind, Plugin, PluginError, Verdict};
use chat_relay::transport::{SourceMessage, Transport};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

pub struct TestMessage {
    pub id: i64,
    pub text: String,
    pub sender_id: i64,
    pub media: HashSet<FileKind>,
    pub transport: Weak<dyn Transport>,
}

impl TestMessage {
    pub fn new(text: &str) -> Self {
        let transport: Weak<NullTransport> = Weak::new();
        Self {
            id: 100,
            text: text.to_string(),
            sender_id: 7,
            media: HashSet::new(),
            transport,
        }
    }

    pub fn with_media(mut self, kind: FileKind) -> Self {
        self.media.insert(kind);
        self
    }

    pub fn shared(self) -> Arc<dyn SourceMessage> {
        Arc::new(self)
    }
}

impl SourceMessage for TestMessage {
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

pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    fn name(&self) -> &str {
        "null"
    }

    async fn download_media(
        &self,
        _message: &dyn SourceMessage,
        _dir: &Path,
    ) -> Result<PathBuf, TransportError> {
        Err(TransportError::Closed)
    }
}

pub type InvocationLog = Arc<Mutex<Vec<String>>>;

pub fn invocation_log() -> InvocationLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Upper-cases the text
pub struct Uppercase {
    pub log: InvocationLog,
}

#[async_trait]
impl Plugin for Uppercase {
    fn id(&self) -> &str {
        "uppercase"
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        self.log.lock().unwrap().push("uppercase".to_string());
        envelope.text = envelope.text.to_uppercase();
        Ok(Verdict::Forward)
    }
}

/// Stops any message whose text contains the blocked word
pub struct BlockWord {
    pub word: String,
    pub log: InvocationLog,
    pub seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Plugin for BlockWord {
    fn id(&self) -> &str {
        "blockword"
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        self.log.lock().unwrap().push("blockword".to_string());
        self.seen.lock().unwrap().push(envelope.text.clone());
        if envelope.text.contains(&self.word) {
            return Ok(Verdict::Stop);
        }
        Ok(Verdict::Forward)
    }
}

/// Records its id, optionally after yielding to the scheduler
pub struct Marker {
    pub id: String,
    pub log: InvocationLog,
    pub suspend: bool,
}

#[async_trait]
impl Plugin for Marker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        if self.suspend {
            tokio::task::yield_now().await;
        }
        self.log.lock().unwrap().push(self.id.clone());
        envelope.text.push_str(&format!("|{}", self.id));
        Ok(Verdict::Forward)
    }
}

/// Mutates the envelope, then fails
pub struct Faulty {
    pub log: InvocationLog,
}

#[async_trait]
impl Plugin for Faulty {
    fn id(&self) -> &str {
        "faulty"
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        self.log.lock().unwrap().push("faulty".to_string());
        envelope.text = "garbage".to_string();
        envelope.reply_to = Some(-1);
        Err(anyhow::anyhow!("upstream service unavailable").into())
    }
}

/// Writes a real file into `dir`, attaches it as an owned replacement and
/// stops the message
pub struct RenderThenStop {
    pub dir: PathBuf,
}

#[async_trait]
impl Plugin for RenderThenStop {
    fn id(&self) -> &str {
        "render"
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        let path = self.dir.join("rendered.png");
        tokio::fs::write(&path, b"png").await?;
        envelope.set_replacement(path, true);
        Ok(Verdict::Stop)
    }
}
