use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::alert::{format_alert, snippet};
use crate::filter::Keywords;
use crate::platform::{AlertSender, IncomingMessage, MessageHandler};

const ALERT_LOG_CHARS: usize = 120;
const NO_MATCH_LOG_CHARS: usize = 80;

/// Log line for a delivered alert.
pub fn alert_log_line(preview: &str) -> String {
    format!("ALERT sent: {}", snippet(preview, ALERT_LOG_CHARS))
}

/// Log line for a message that matched no keyword. Shows the folded text the
/// keywords were compared against.
pub fn no_match_log_line(text: &str) -> String {
    format!("No match: {}", snippet(&text.to_lowercase(), NO_MATCH_LOG_CHARS))
}

/// Filter, format and forward: the handler run for every watched message.
///
/// Holds no mutable state, so concurrent invocations for a burst of
/// messages need no coordination.
pub struct Watcher {
    keywords: Keywords,
    sender: Arc<dyn AlertSender>,
}

impl Watcher {
    pub fn new(keywords: Keywords, sender: Arc<dyn AlertSender>) -> Self {
        Self { keywords, sender }
    }
}

#[async_trait]
impl MessageHandler for Watcher {
    async fn handle(&self, message: IncomingMessage) -> Result<()> {
        let Some(keyword) = self.keywords.first_match(&message.text) else {
            info!("{}", no_match_log_line(&message.text));
            return Ok(());
        };

        let alert = format_alert(&message);
        debug!(
            "Keyword '{}' hit in chat {} (link: {:?})",
            keyword,
            message.chat_id,
            alert.link()
        );
        self.sender
            .send(&alert)
            .await
            .with_context(|| format!("Failed to deliver alert for chat {}", message.chat_id))?;

        info!("{}", alert_log_line(alert.preview()));
        Ok(())
    }
}
