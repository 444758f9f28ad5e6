//! Run loop: reads every channel, feeds messages through the conversation
//! engine and sends the replies back.
//!
//! Messages from one chat are handled in arrival order by a per-chat worker
//! task; different chats proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse};
use crate::conversation::ConversationEngine;
use crate::conversation::prompts::GENERIC_FAILURE;
use crate::error::Error;

pub struct OrderBot {
    engine: Arc<ConversationEngine>,
    channels: Arc<ChannelManager>,
    sweep_interval: Duration,
}

impl OrderBot {
    pub fn new(
        engine: Arc<ConversationEngine>,
        channels: ChannelManager,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            engine,
            channels: Arc::new(channels),
            sweep_interval,
        }
    }

    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;

        // Idle session sweeper
        let sessions = self.engine.sessions().clone();
        let sweep_interval = self.sweep_interval;
        let sweeper_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                sessions.sweep().await;
            }
        });

        // Queues outlive a session's idle window so a late message still
        // lands behind the ones before it.
        let queue_idle = self
            .engine
            .sessions()
            .idle_timeout()
            .to_std()
            .unwrap_or(sweep_interval)
            .max(sweep_interval);
        let mut queues = ChatQueues::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.channels),
            queue_idle,
        );

        tracing::info!(channels = ?self.channels.names(), "Order desk ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            queues.dispatch(message);
        }

        tracing::info!("Order desk shutting down...");
        sweeper_handle.abort();
        queues.drain().await;
        self.channels.shutdown_all().await?;

        Ok(())
    }
}

/// Handle one message end to end: engine, then reply on its channel.
async fn process(engine: &ConversationEngine, channels: &ChannelManager, message: IncomingMessage) {
    let key = message.session_key();
    tracing::debug!(
        session = %key,
        user = message.sender(),
        chars = message.content.chars().count(),
        "Message received"
    );

    let reply = match engine.handle(&key, message.sender(), &message.content).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(session = %key, error = %e, "Error handling message");
            GENERIC_FAILURE.to_string()
        }
    };

    if let Err(e) = channels.respond(&message, OutgoingResponse::text(reply)).await {
        tracing::warn!(session = %key, error = %e, "Failed to send reply");
    }
}

struct ChatQueue {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    worker: JoinHandle<()>,
}

/// One FIFO worker per session key. A worker exits after `idle` without
/// messages; its successor waits for it before taking new work.
struct ChatQueues {
    engine: Arc<ConversationEngine>,
    channels: Arc<ChannelManager>,
    idle: Duration,
    queues: HashMap<String, ChatQueue>,
}

impl ChatQueues {
    fn new(engine: Arc<ConversationEngine>, channels: Arc<ChannelManager>, idle: Duration) -> Self {
        Self {
            engine,
            channels,
            idle,
            queues: HashMap::new(),
        }
    }

    fn dispatch(&mut self, message: IncomingMessage) {
        let key = message.session_key();

        let message = match self.queues.get(&key) {
            Some(queue) => match queue.tx.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let previous = self.queues.remove(&key).map(|q| q.worker);
        let (tx, rx) = mpsc::unbounded_channel();
        // Fresh receiver, cannot be closed yet.
        let _ = tx.send(message);
        let worker = tokio::spawn(run_worker(
            Arc::clone(&self.engine),
            Arc::clone(&self.channels),
            rx,
            previous,
            self.idle,
        ));
        self.queues.insert(key, ChatQueue { tx, worker });

        self.queues.retain(|_, q| !q.worker.is_finished());
    }

    /// Stop accepting messages and wait for in-flight ones to finish.
    async fn drain(self) {
        for (key, queue) in self.queues {
            drop(queue.tx);
            if let Err(e) = queue.worker.await {
                tracing::warn!(session = %key, error = %e, "Chat worker ended abnormally");
            }
        }
    }
}

async fn run_worker(
    engine: Arc<ConversationEngine>,
    channels: Arc<ChannelManager>,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    previous: Option<JoinHandle<()>>,
    idle: Duration,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(message)) => process(&engine, &channels, message).await,
            Ok(None) => return,
            Err(_) => {
                // Refuse new sends, then finish what was already queued.
                rx.close();
                while let Some(message) = rx.recv().await {
                    process(&engine, &channels, message).await;
                }
                return;
            }
        }
    }
}
