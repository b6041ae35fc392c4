//! Forwarding of incoming messages
//!
//! Glues the plugin pipeline to the delivery side of the transport: run the
//! chain, hand the resulting envelope to the destination, release it.

use crate::plugin::Pipeline;
use crate::transport::{Delivery, SourceMessage};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

/// What happened to one incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Delivered to the destination
    Delivered,
    /// A plugin stopped the message
    Vetoed,
    /// The chain did not finish within the message timeout
    TimedOut,
    /// The chain finished but delivery failed
    DeliveryFailed(String),
}

pub struct Forwarder {
    pipeline: Arc<Pipeline>,
    delivery: Arc<dyn Delivery>,
    message_timeout: Option<Duration>,
}

impl Forwarder {
    pub fn new(pipeline: Arc<Pipeline>, delivery: Arc<dyn Delivery>) -> Self {
        Self {
            pipeline,
            delivery,
            message_timeout: None,
        }
    }

    /// Give up on a message whose chain runs longer than `timeout_ms`
    pub fn with_message_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.message_timeout = timeout_ms.map(Duration::from_millis);
        self
    }

    pub async fn forward(&self, message: Arc<dyn SourceMessage>) -> ForwardOutcome {
        let message_id = message.id();

        let processed = match self.message_timeout {
            Some(limit) => match timeout(limit, self.pipeline.apply(message)).await {
                Ok(processed) => processed,
                Err(_) => {
                    warn!(
                        message_id,
                        timeout_ms = limit.as_millis() as u64,
                        "Plugin chain timed out"
                    );
                    return ForwardOutcome::TimedOut;
                }
            },
            None => self.pipeline.apply(message).await,
        };

        let Some(envelope) = processed else {
            info!(message_id, "Message not forwarded");
            return ForwardOutcome::Vetoed;
        };

        // The envelope is dropped at the end of this scope, which releases
        // any replacement file it owns.
        match self.delivery.deliver(&envelope).await {
            Ok(()) => {
                info!(message_id, "Message forwarded");
                ForwardOutcome::Delivered
            }
            Err(e) => {
                error!(message_id, error = %e, "Failed to deliver message");
                ForwardOutcome::DeliveryFailed(e.to_string())
            }
        }
    }
}
