use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use noteit_core::config::DiscordConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::Mutex,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::{
    events::{ChatMessage, ChatUser, GatewayEnvelope, GatewayEvent, ReadyEvent},
    gateway::{GatewayTransport, TransportError},
};

/// `GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT`
pub const DEFAULT_INTENTS: u64 = (1 << 9) | (1 << 12) | (1 << 15);

const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

type GatewayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live gateway connection over a websocket. Heartbeats are driven from
/// `next_envelope`, so the runner must keep polling it while connected.
pub struct DiscordGatewayTransport {
    gateway_url: String,
    session: Mutex<Option<GatewaySession>>,
}

struct GatewaySession {
    stream: GatewayStream,
    heartbeat: Interval,
    last_sequence: Option<u64>,
    awaiting_ack: bool,
}

enum Step {
    Heartbeat,
    Frame(Option<Result<Message, WsError>>),
}

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloPayload {
    heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    id: String,
    channel_id: String,
    #[serde(default)]
    guild_id: Option<String>,
    author: UserPayload,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ReadyPayload {
    session_id: String,
    user: UserPayload,
}

impl From<UserPayload> for ChatUser {
    fn from(user: UserPayload) -> Self {
        Self { id: user.id, name: user.username, bot: user.bot }
    }
}

impl DiscordGatewayTransport {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self { gateway_url: gateway_url.into(), session: Mutex::new(None) }
    }

    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::new(config.gateway_url.clone())
    }
}

#[async_trait]
impl GatewayTransport for DiscordGatewayTransport {
    async fn connect(&self, token: &SecretString) -> Result<(), TransportError> {
        let (mut stream, _) = connect_async(self.gateway_url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let hello = tokio::time::timeout(HELLO_TIMEOUT, read_hello(&mut stream))
            .await
            .map_err(|_| TransportError::Connect("timed out waiting for hello".to_owned()))??;

        let identify = json!({
            "op": opcode::IDENTIFY,
            "d": {
                "token": token.expose_secret(),
                "intents": DEFAULT_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "noteit",
                    "device": "noteit",
                },
            },
        });
        stream
            .send(Message::Text(identify.to_string()))
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let period = Duration::from_millis(hello.heartbeat_interval.max(1));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(heartbeat_interval_ms = hello.heartbeat_interval, "gateway identified");
        *self.session.lock().await =
            Some(GatewaySession { stream, heartbeat, last_sequence: None, awaiting_ack: false });
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(TransportError::Receive("gateway is not connected".to_owned()));
        };

        loop {
            let step = tokio::select! {
                _ = session.heartbeat.tick() => Step::Heartbeat,
                frame = session.stream.next() => Step::Frame(frame),
            };

            let frame = match step {
                Step::Heartbeat => {
                    if session.awaiting_ack {
                        return Err(TransportError::Receive(
                            "heartbeat was not acknowledged".to_owned(),
                        ));
                    }
                    session.send_heartbeat().await?;
                    continue;
                }
                Step::Frame(None) => return Ok(None),
                Step::Frame(Some(frame)) => {
                    frame.map_err(|error| TransportError::Receive(error.to_string()))?
                }
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    let reason = frame.map_or_else(
                        || "no close frame".to_owned(),
                        |frame| format!("{} {}", frame.code, frame.reason),
                    );
                    return Err(TransportError::Receive(format!("gateway closed: {reason}")));
                }
                _ => continue,
            };

            let payload: GatewayPayload = match serde_json::from_str(&text) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(error = %error, "skipping unreadable gateway payload");
                    continue;
                }
            };

            match payload.op {
                opcode::DISPATCH => {
                    let sequence = payload.s.unwrap_or_default();
                    if payload.s.is_some() {
                        session.last_sequence = payload.s;
                    }
                    let event_type = payload.t.unwrap_or_default();
                    let event = event_from_dispatch(&event_type, payload.d);
                    return Ok(Some(GatewayEnvelope { sequence, event }));
                }
                opcode::HEARTBEAT => session.send_heartbeat().await?,
                opcode::HEARTBEAT_ACK => session.awaiting_ack = false,
                opcode::RECONNECT => {
                    return Err(TransportError::Receive("gateway requested reconnect".to_owned()))
                }
                opcode::INVALID_SESSION => {
                    return Err(TransportError::Receive("gateway session invalidated".to_owned()))
                }
                other => debug!(op = other, "ignoring gateway opcode"),
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };

        match session.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}

impl GatewaySession {
    async fn send_heartbeat(&mut self) -> Result<(), TransportError> {
        let heartbeat = json!({ "op": opcode::HEARTBEAT, "d": self.last_sequence });
        self.stream
            .send(Message::Text(heartbeat.to_string()))
            .await
            .map_err(|error| TransportError::Receive(error.to_string()))?;
        self.awaiting_ack = true;
        Ok(())
    }
}

async fn read_hello(stream: &mut GatewayStream) -> Result<HelloPayload, TransportError> {
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|error| TransportError::Connect(error.to_string()))?;
        let Message::Text(text) = frame else {
            continue;
        };

        let payload: GatewayPayload = serde_json::from_str(&text)
            .map_err(|error| TransportError::Connect(format!("unreadable hello: {error}")))?;
        if payload.op == opcode::HELLO {
            return serde_json::from_value(payload.d)
                .map_err(|error| TransportError::Connect(format!("unreadable hello: {error}")));
        }
    }

    Err(TransportError::Connect("gateway closed before hello".to_owned()))
}

/// Maps a dispatch payload onto the events the bot understands. Payloads
/// that do not match their declared shape are reported as unsupported.
fn event_from_dispatch(event_type: &str, data: Value) -> GatewayEvent {
    let parsed = match event_type {
        "MESSAGE_CREATE" => serde_json::from_value::<MessagePayload>(data).map(|message| {
            GatewayEvent::MessageCreate(ChatMessage {
                message_id: message.id,
                channel_id: message.channel_id,
                guild_id: message.guild_id,
                author: message.author.into(),
                content: message.content,
            })
        }),
        "READY" => serde_json::from_value::<ReadyPayload>(data).map(|ready| {
            GatewayEvent::Ready(ReadyEvent { session_id: ready.session_id, user: ready.user.into() })
        }),
        _ => return GatewayEvent::Unsupported { event_type: event_type.to_owned() },
    };

    parsed.unwrap_or_else(|error| {
        warn!(event_type, error = %error, "gateway dispatch did not match its event type");
        GatewayEvent::Unsupported { event_type: event_type.to_owned() }
    })
}
