use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode, Recipient};
use teloxide::utils::html;
use tracing::{info, warn};

use crate::alert::AlertPayload;
use crate::config::{Destination, WatchConfig};
use crate::platform::AlertSender;

fn recipient_for(destination: &Destination) -> Result<Recipient> {
    match destination {
        Destination::SavedMessages => {
            bail!("A bot has no saved messages; set ALERT_CHAT to a chat ID or @username")
        }
        Destination::ChatId(id) => Ok(Recipient::Id(ChatId(*id))),
        Destination::Username(name) => Ok(Recipient::ChannelUsername(format!("@{}", name))),
    }
}

fn no_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// HTML body for alerts sent through the Bot API. Message text is escaped.
pub fn render_html(alert: &AlertPayload) -> String {
    match alert {
        AlertPayload::Channel {
            title,
            preview,
            link,
        } => {
            let mut text = format!(
                "🛑 <b>Keyword hit in {}</b>\n\n<pre>{}</pre>",
                html::escape(title),
                html::escape(preview)
            );
            if let Some(link) = link {
                text.push_str(&format!(
                    "\n<a href=\"{}\">Jump to message</a>",
                    html::escape(link)
                ));
            }
            text
        }
        AlertPayload::Bare { preview } => html::escape(preview),
    }
}

/// Reply for `/start` and `/status`.
pub fn status_text(config: &WatchConfig) -> String {
    let chats: Vec<String> = config.watched.iter().map(|c| c.to_string()).collect();
    let keywords: Vec<&str> = config.keywords.iter().collect();
    format!(
        "Watching {} chats:\n{}\n\nKeywords: {}\nAlerts go to: {}",
        chats.len(),
        chats
            .iter()
            .map(|c| format!("  - {}", c))
            .collect::<Vec<_>>()
            .join("\n"),
        keywords.join(", "),
        config.destination
    )
}

/// Sends alerts from a separate bot identity.
#[derive(Clone)]
pub struct BotSender {
    bot: Bot,
    recipient: Recipient,
}

impl BotSender {
    /// Authenticate the bot token and bind the destination.
    pub async fn connect(token: &str, destination: &Destination) -> Result<Self> {
        let recipient = recipient_for(destination)?;
        let bot = Bot::new(token);
        let me = bot
            .get_me()
            .await
            .context("Failed to authenticate alert bot")?;
        info!("Alert bot signed in as @{}", me.username());
        Ok(Self { bot, recipient })
    }

    fn is_destination(&self, chat_id: ChatId, username: Option<&str>) -> bool {
        match &self.recipient {
            Recipient::Id(id) => chat_id == *id,
            Recipient::ChannelUsername(name) => username
                .is_some_and(|u| name.trim_start_matches('@').eq_ignore_ascii_case(u)),
        }
    }

    fn accept(&self, msg: Message) -> Option<Message> {
        if self.is_destination(msg.chat.id, msg.chat.username()) {
            Some(msg)
        } else {
            None
        }
    }

    /// Run the bot's update loop. It only answers `/start` and `/status`
    /// from the alert chat, which may be a private chat, a group or a
    /// channel (where commands arrive as channel posts).
    pub async fn run(self, config: Arc<WatchConfig>) -> Result<()> {
        info!("Starting alert bot...");

        let from_message = self.clone();
        let from_post = self.clone();
        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_map(move |msg: Message| from_message.accept(msg))
                    .endpoint(handle_command),
            )
            .branch(
                Update::filter_channel_post()
                    .filter_map(move |post: Message| from_post.accept(post))
                    .endpoint(handle_command),
            );

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![config])
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd.id);
            })
            .error_handler(LoggingErrorHandler::with_custom_text("alert bot"))
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

/// `/start` or `/status`, optionally addressed as `/status@botname`.
fn is_status_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    command == "/start" || command == "/status"
}

async fn handle_command(bot: Bot, msg: Message, config: Arc<WatchConfig>) -> ResponseResult<()> {
    if msg.text().is_some_and(is_status_command) {
        bot.send_message(msg.chat.id, status_text(&config)).await?;
    }

    Ok(())
}

#[async_trait]
impl AlertSender for BotSender {
    async fn send(&self, alert: &AlertPayload) -> Result<()> {
        self.bot
            .send_message(self.recipient.clone(), render_html(alert))
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_link_preview())
            .await
            .context("Failed to send alert via bot")?;
        Ok(())
    }
}
