//! Plugin contract

use crate::plugin::envelope::Envelope;
use crate::plugin::error::PluginError;
use async_trait::async_trait;

/// Outcome of a successful [`Plugin::modify`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the (possibly mutated) envelope to the next plugin
    Forward,
    /// Do not forward this message; no further plugins run
    Stop,
}

/// A unit that inspects and mutates an [`Envelope`].
///
/// Instances are shared across every message for the lifetime of the
/// process, so `modify` must not write unsynchronized state on `self`.
/// Construction happens in the factory registered with
/// [`PluginFactories`](crate::plugin::PluginFactories) and must not do I/O;
/// anything that needs I/O belongs in [`Plugin::async_init`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable identifier; must match the id the plugin is configured under
    fn id(&self) -> &str;

    /// One-time setup, run once before the first message when the plugin is
    /// registered as requiring async init
    async fn async_init(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Process one message.
    ///
    /// Implementations that never await simply return; the executor drives
    /// both kinds through the same call.
    async fn modify(&self, envelope: &mut Envelope) -> Result<Verdict, PluginError>;
}
