pub mod mtproto;
pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::alert::AlertPayload;
use crate::config::{WatchConfig, WatchList};

/// Kind of chat a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// One-to-many channel where only admins post.
    Broadcast,
    Group,
    Private,
}

/// A new message received from a watched chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    /// Display title of the chat, if Telegram sent one
    pub chat_title: Option<String>,
    pub kind: SourceKind,
    /// Raw message text (empty for media without caption)
    pub text: String,
    /// Deep link to the message
    pub permalink: Option<String>,
}

/// Receives every message that passed the subscription's watch list.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: IncomingMessage) -> Result<()>;
}

/// A backend connection that can deliver new messages.
#[async_trait]
pub trait MessageSource {
    /// Run the connection's event loop, passing each new message from a chat
    /// in `watch` to `handler`. Returns only when the connection ends.
    async fn subscribe(&self, watch: WatchList, handler: Arc<dyn MessageHandler>) -> Result<()>;
}

/// Delivers alerts to the configured destination.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, alert: &AlertPayload) -> Result<()>;
}

/// The connection alerts go out on.
pub enum AlertConnection {
    /// Send from the same user session that is listening.
    ReuseListener(mtproto::SessionSender),
    /// Send from a separately authenticated bot.
    BotIdentity(telegram::BotSender),
}

impl AlertConnection {
    /// Pick the sending identity: the bot when a token is configured,
    /// otherwise the listener itself.
    pub async fn connect(config: &WatchConfig, listener: &mtproto::Listener) -> Result<Self> {
        match config.bot_token.as_deref() {
            Some(token) => {
                let sender = telegram::BotSender::connect(token, &config.destination).await?;
                Ok(AlertConnection::BotIdentity(sender))
            }
            None => {
                let sender = mtproto::SessionSender::resolve(listener, &config.destination).await?;
                Ok(AlertConnection::ReuseListener(sender))
            }
        }
    }

    pub fn sender(&self) -> Arc<dyn AlertSender> {
        match self {
            AlertConnection::ReuseListener(sender) => Arc::new(sender.clone()),
            AlertConnection::BotIdentity(sender) => Arc::new(sender.clone()),
        }
    }

    /// Service this connection's own event loop, if it has one.
    pub async fn run(self, config: Arc<WatchConfig>) -> Result<()> {
        match self {
            AlertConnection::ReuseListener(_) => {
                info!("Alerts share the listener connection");
                futures::future::pending::<()>().await;
                Ok(())
            }
            AlertConnection::BotIdentity(sender) => sender.run(config).await,
        }
    }
}
