//! Wraps the message text in a fixed header and footer

use crate::plugin::envelope::Envelope;
use crate::plugin::error::PluginError;
use crate::plugin::traits::{Plugin, Verdict};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ID: &str = "caption";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub header: String,
    pub footer: String,
}

pub struct Caption {
    config: CaptionConfig,
}

impl Caption {
    pub fn new(config: CaptionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Plugin for Caption {
    fn id(&self) -> &str {
        ID
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        envelope.text = format!("{}{}{}", self.config.header, envelope.text, self.config.footer);
        Ok(Verdict::Forward)
    }
}
