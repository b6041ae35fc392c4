//! Rewrites parts of the message text

use crate::plugin::envelope::Envelope;
use crate::plugin::error::PluginError;
use crate::plugin::traits::{Plugin, Verdict};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ID: &str = "replace";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplaceConfig {
    /// Applied in order, each to the output of the previous one
    pub rules: Vec<ReplaceRule>,
    /// Treat `from` as a regular expression; `to` may use `$1` captures
    pub regex: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplaceRule {
    pub from: String,
    pub to: String,
}

enum Matcher {
    Literal(String),
    Pattern(Regex),
}

pub struct Replace {
    rules: Vec<(Matcher, String)>,
}

impl Replace {
    /// Patterns are compiled here so a bad expression fails at load time
    pub fn new(config: ReplaceConfig) -> Result<Self, PluginError> {
        let rules = config
            .rules
            .into_iter()
            .map(|rule| {
                let matcher = if config.regex {
                    let pattern = Regex::new(&rule.from).map_err(|e| PluginError::InvalidConfig {
                        id: ID.to_string(),
                        reason: e.to_string(),
                    })?;
                    Matcher::Pattern(pattern)
                } else {
                    Matcher::Literal(rule.from)
                };
                Ok((matcher, rule.to))
            })
            .collect::<Result<Vec<_>, PluginError>>()?;

        Ok(Self { rules })
    }
}

#[async_trait]
impl Plugin for Replace {
    fn id(&self) -> &str {
        ID
    }

    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError> {
        for (matcher, to) in &self.rules {
            envelope.text = match matcher {
                Matcher::Literal(from) if from.is_empty() => continue,
                Matcher::Literal(from) => envelope.text.replace(from.as_str(), to),
                Matcher::Pattern(re) => re.replace_all(&envelope.text, to.as_str()).into_owned(),
            };
        }
        Ok(Verdict::Forward)
    }
}
