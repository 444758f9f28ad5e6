//! Channel trait and the message types that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::ChannelError;

/// A text message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Name of the channel that produced it (`"telegram"`, `"cli"`).
    pub channel: String,
    /// Stable sender id within the channel (numeric id on Telegram).
    pub user_id: String,
    /// Human-facing sender name: username, else first name.
    pub user_name: Option<String>,
    /// Conversation the message belongs to; replies go back here.
    pub chat_id: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            chat_id: user_id.to_string(),
            content: content.to_string(),
            received_at: Utc::now(),
        }
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    pub fn with_chat_id(mut self, chat_id: &str) -> Self {
        self.chat_id = chat_id.to_string();
        self
    }

    /// Session identity: one conversation per channel and chat.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Name recorded as the order's submitter.
    pub fn sender(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// A reply to send back on the channel a message came from.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving. The stream ends when the channel stops.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send `response` to the chat `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
