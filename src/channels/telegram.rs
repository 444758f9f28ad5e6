//! Telegram channel: long-polls the Bot API for text messages and replies
//! through `sendMessage`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::split::split_message;
use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;
use crate::order::UNKNOWN_USER;

/// Hard limit of Telegram's sendMessage API.
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel. Connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    max_message_len: usize,
    part_delay: Duration,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            max_message_len: 4000,
            part_delay: Duration::from_millis(100),
            client: reqwest::Client::new(),
        }
    }

    /// Split limit for outbound text, clamped to Telegram's own limit.
    pub fn with_max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = max.clamp(1, TELEGRAM_MAX_MESSAGE_LENGTH);
        self
    }

    /// Pause between the parts of a split message.
    pub fn with_part_delay(mut self, delay: Duration) -> Self {
        self.part_delay = delay;
        self
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Check if a username or id is in the allowed list.
    pub fn is_user_allowed(&self, identity: &str) -> bool {
        check_user_allowed(&self.allowed_users, [identity])
    }

    /// Send `text`, split at line boundaries, parts in order with a pause
    /// between them.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let parts = split_message(text, self.max_message_len);
        let count = parts.len();

        for (i, part) in parts.iter().enumerate() {
            self.send_part(chat_id, part).await?;
            if i + 1 < count {
                tokio::time::sleep(self.part_delay).await;
            }
        }
        if count > 1 {
            tracing::debug!(chat_id, parts = count, "Long message sent in parts");
        }
        Ok(())
    }

    /// Send one part, Markdown first with a plain-text fallback.
    async fn send_part(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(send_failed)?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(send_failed)?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array) else {
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        if msg.chat_id.is_empty() {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id on message".into(),
            });
        }
        self.send_message(&msg.chat_id, &response.content).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(token: &SecretString, method: &str) -> String {
    format!("https://api.telegram.org/bot{}/{method}", token.expose_secret())
}

// Request errors carry the URL, and the URL carries the token.
fn send_failed(e: reqwest::Error) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason: e.without_url().to_string(),
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().filter(|id| !id.is_empty()).collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Turn one `getUpdates` entry into a message. Non-text updates and
/// senders outside the allowlist yield `None`.
fn parse_update(update: &serde_json::Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(serde_json::Value::as_str);
    let first_name = from
        .and_then(|f| f.get("first_name"))
        .and_then(serde_json::Value::as_str);
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string());

    let mut identities: Vec<&str> = username.into_iter().collect();
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities) {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: username={}, user_id={}",
            username.unwrap_or("unknown"),
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?
        .to_string();

    let sender = username.or(first_name).unwrap_or(UNKNOWN_USER);
    Some(
        IncomingMessage::new("telegram", user_id.as_deref().unwrap_or(sender), text)
            .with_chat_id(&chat_id)
            .with_user_name(sender),
    )
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(allowed: &[&str]) -> TelegramChannel {
        TelegramChannel::new(
            SecretString::from("123:ABC".to_string()),
            allowed.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn update(text: Option<&str>, username: Option<&str>) -> serde_json::Value {
        let mut from = serde_json::json!({ "id": 555, "first_name": "Ana" });
        if let Some(u) = username {
            from["username"] = serde_json::json!(u);
        }
        let mut message = serde_json::json!({
            "message_id": 1,
            "chat": { "id": -1001 },
            "from": from,
        });
        if let Some(t) = text {
            message["text"] = serde_json::json!(t);
        }
        serde_json::json!({ "update_id": 10, "message": message })
    }

    #[test]
    fn telegram_channel_name_and_url() {
        let ch = channel(&["*"]);
        assert_eq!(ch.name(), "telegram");
        assert_eq!(ch.api_url("getMe"), "https://api.telegram.org/bot123:ABC/getMe");
    }

    #[test]
    fn allowlist_wildcard_and_exact_match() {
        assert!(channel(&["*"]).is_user_allowed("anyone"));
        let ch = channel(&["alice", "987654321"]);
        assert!(ch.is_user_allowed("alice"));
        assert!(ch.is_user_allowed("987654321"));
        assert!(!ch.is_user_allowed("malice"));
        assert!(!ch.is_user_allowed("Alice"));
        assert!(!ch.is_user_allowed(""));
        assert!(!channel(&[]).is_user_allowed("anyone"));
    }

    #[test]
    fn parses_text_update() {
        let msg = parse_update(&update(Some("hola"), Some("ana_t")), &["*".into()]).unwrap();
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.content, "hola");
        assert_eq!(msg.user_id, "555");
        assert_eq!(msg.chat_id, "-1001");
        assert_eq!(msg.sender(), "ana_t");
        assert_eq!(msg.session_key(), "telegram:-1001");
    }

    #[test]
    fn sender_falls_back_to_first_name() {
        let msg = parse_update(&update(Some("hola"), None), &["*".into()]).unwrap();
        assert_eq!(msg.sender(), "Ana");
    }

    #[test]
    fn skips_non_text_and_unauthorized_updates() {
        assert!(parse_update(&update(None, Some("ana_t")), &["*".into()]).is_none());
        assert!(parse_update(&update(Some("hola"), Some("eve")), &["alice".into()]).is_none());
        assert!(parse_update(&update(Some("hola"), None), &["555".into()]).is_some());
    }

    #[test]
    fn max_len_is_clamped() {
        let ch = channel(&["*"]).with_max_message_len(10_000);
        assert_eq!(ch.max_message_len, TELEGRAM_MAX_MESSAGE_LENGTH);

        let reply = vec!["x".repeat(TELEGRAM_MAX_MESSAGE_LENGTH); 3].join("\n");
        let parts = split_message(&reply, ch.max_message_len);
        assert!(parts
            .iter()
            .all(|p| p.chars().count() <= TELEGRAM_MAX_MESSAGE_LENGTH));
    }
}
