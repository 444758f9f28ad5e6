//! ChannelManager: owns the registered channels, merges their inbound
//! streams and routes replies back by channel name.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

#[derive(Default)]
pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its own name. A later channel with the same
    /// name replaces the earlier one.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        let channel: Arc<dyn Channel> = Arc::from(channel);
        self.channels.insert(channel.name().to_string(), channel);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every channel and merge their streams. Fails if any channel
    /// fails to start.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            let stream = channel.start().await?;
            tracing::info!(channel = %name, "Channel started");
            streams.push(stream);
        }
        Ok(Box::pin(stream::select_all(streams)))
    }

    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get(&msg.channel)
            .ok_or_else(|| ChannelError::UnknownChannel {
                name: msg.channel.clone(),
            })?;
        channel.respond(msg, response).await
    }

    /// Health of every channel, by name.
    pub async fn health_check_all(&self) -> Vec<(String, Result<(), ChannelError>)> {
        let mut results = Vec::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            results.push((name.clone(), channel.health_check().await));
        }
        results
    }

    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = %name, error = %e, "Channel shutdown failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    struct FakeChannel {
        name: &'static str,
        inbound: Vec<&'static str>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let msgs: Vec<IncomingMessage> = self
                .inbound
                .iter()
                .map(|t| IncomingMessage::new(self.name, "u", t))
                .collect();
            Ok(Box::pin(stream::iter(msgs)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(response.content);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn fake(name: &'static str, inbound: Vec<&'static str>) -> (Box<dyn Channel>, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let channel = FakeChannel {
            name,
            inbound,
            sent: sent.clone(),
        };
        (Box::new(channel), sent)
    }

    #[tokio::test]
    async fn merges_streams_and_routes_replies() {
        let (a, a_sent) = fake("a", vec!["uno", "dos"]);
        let (b, b_sent) = fake("b", vec!["tres"]);
        let mut manager = ChannelManager::new();
        manager.add(a);
        manager.add(b);
        assert_eq!(manager.names(), vec!["a", "b"]);

        let received: Vec<IncomingMessage> = manager.start_all().await.unwrap().collect().await;
        assert_eq!(received.len(), 3);

        for msg in &received {
            manager
                .respond(msg, OutgoingResponse::text(format!("eco {}", msg.content)))
                .await
                .unwrap();
        }
        assert_eq!(a_sent.lock().unwrap().len(), 2);
        assert_eq!(*b_sent.lock().unwrap(), vec!["eco tres".to_string()]);
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let manager = ChannelManager::new();
        let msg = IncomingMessage::new("nope", "u", "hola");
        assert!(matches!(
            manager.respond(&msg, OutgoingResponse::text("x")).await,
            Err(ChannelError::UnknownChannel { .. })
        ));
    }
}
