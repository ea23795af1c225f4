use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use noteit_core::config::TransportMode;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    events::{EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent, HandlerResult},
    rest::{DirectMessenger, MESSAGE_CHAR_LIMIT},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of gateway events. `next_envelope` returning `None` means the
/// stream closed cleanly.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self, token: &SecretString) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    fn mode(&self) -> TransportMode {
        TransportMode::Gateway
    }
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self, _token: &SecretString) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Noop
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    messenger: Arc<dyn DirectMessenger>,
    dispatcher: EventDispatcher,
    token: SecretString,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        messenger: Arc<dyn DirectMessenger>,
        dispatcher: EventDispatcher,
        token: SecretString,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, messenger, dispatcher, token, reconnect_policy }
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.transport.mode()
    }

    pub fn is_noop_transport(&self) -> bool {
        self.transport_mode() == TransportMode::Noop
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Messages are handled one at a time in arrival order.
    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway connection");
        self.transport.connect(&self.token).await?;
        info!(attempt, "gateway connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let correlation_id = correlation_id(&envelope);

            debug!(
                event_name = "ingress.discord.event_received",
                sequence = envelope.sequence,
                event_type = ?envelope.event.event_type(),
                correlation_id = %correlation_id,
                "received gateway event"
            );

            let context = EventContext { correlation_id };
            if let HandlerResult::Responded(outgoing) =
                self.dispatcher.dispatch(&envelope, &context).await
            {
                let messages = outgoing.reply.render_messages(MESSAGE_CHAR_LIMIT);
                if let Err(error) =
                    self.messenger.send_direct(&outgoing.recipient_id, &messages).await
                {
                    warn!(
                        event_name = "egress.discord.direct_message_failed",
                        correlation_id = %context.correlation_id,
                        recipient_id = %outgoing.recipient_id,
                        error = %error,
                        "failed to deliver reply; continuing gateway loop"
                    );
                }
            }
        }
    }
}

fn correlation_id(envelope: &GatewayEnvelope) -> String {
    match &envelope.event {
        GatewayEvent::MessageCreate(message) => message.message_id.clone(),
        GatewayEvent::Ready(ready) => ready.session_id.clone(),
        GatewayEvent::Unsupported { .. } => format!("seq-{}", envelope.sequence),
    }
}
