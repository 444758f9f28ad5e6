//! CLI channel: stdin/stdout REPL for trying the bot locally.
//!
//! Each stdin line is one message. A line ending in `\` continues on the
//! next one, so a quick-order block can be typed as a single message.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

pub struct CliChannel {
    user_name: String,
}

impl CliChannel {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new("local-user")
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_name = self.user_name.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            let mut lines = reader.lines();
            let mut pending = String::new();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(head) = line.strip_suffix('\\') {
                            pending.push_str(head);
                            pending.push('\n');
                            eprint!(". ");
                            continue;
                        }
                        pending.push_str(&line);
                        let text = std::mem::take(&mut pending);
                        if text.trim().is_empty() {
                            eprint!("> ");
                            continue;
                        }

                        let msg = IncomingMessage::new("cli", "local", &text)
                            .with_user_name(&user_name);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", response.content);
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
