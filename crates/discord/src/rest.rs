use async_trait::async_trait;
use noteit_core::config::DiscordConfig;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Longest message body the chat API accepts, in characters.
pub const MESSAGE_CHAR_LIMIT: usize = 2_000;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("chat api request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chat api rejected {operation} with status {status}: {body}")]
    Rejected { operation: &'static str, status: u16, body: String },
}

/// Sends private messages to a single user. `messages` are delivered in
/// order and must each fit within [`MESSAGE_CHAR_LIMIT`].
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct(
        &self,
        recipient_id: &str,
        messages: &[String],
    ) -> Result<(), DeliveryError>;
}

#[derive(Deserialize)]
struct DirectChannel {
    id: String,
}

pub struct DiscordRestMessenger {
    client: Client,
    api_base_url: String,
    token: SecretString,
}

impl DiscordRestMessenger {
    pub fn new(token: SecretString, api_base_url: impl Into<String>) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Self { client: Client::new(), api_base_url, token }
    }

    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::new(config.token.clone(), config.api_base_url.clone())
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    async fn open_direct_channel(&self, recipient_id: &str) -> Result<String, DeliveryError> {
        let response = self
            .client
            .post(format!("{}/users/@me/channels", self.api_base_url))
            .header("Authorization", self.authorization())
            .json(&json!({ "recipient_id": recipient_id }))
            .send()
            .await?;
        let response = ensure_success("open direct channel", response).await?;

        let channel: DirectChannel = response.json().await?;
        Ok(channel.id)
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(format!("{}/channels/{channel_id}/messages", self.api_base_url))
            .header("Authorization", self.authorization())
            .json(&json!({ "content": content }))
            .send()
            .await?;
        ensure_success("create message", response).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectMessenger for DiscordRestMessenger {
    async fn send_direct(
        &self,
        recipient_id: &str,
        messages: &[String],
    ) -> Result<(), DeliveryError> {
        let channel_id = self.open_direct_channel(recipient_id).await?;
        for message in messages {
            self.post_message(&channel_id, message).await?;
        }

        debug!(
            event_name = "egress.discord.direct_message_sent",
            recipient_id,
            channel_id = %channel_id,
            chunks = messages.len(),
            "direct message delivered"
        );
        Ok(())
    }
}

async fn ensure_success(
    operation: &'static str,
    response: Response,
) -> Result<Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Rejected { operation, status: status.as_u16(), body })
}

/// Splits `content` into pieces of at most `limit` characters.
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    if limit == 0 || content.chars().count() <= limit {
        return vec![content.to_owned()];
    }

    let chars: Vec<char> = content.chars().collect();
    chars.chunks(limit).map(|chunk| chunk.iter().collect()).collect()
}
