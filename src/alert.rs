use crate::platform::{IncomingMessage, SourceKind};

/// Maximum number of characters of message text carried in an alert.
pub const PREVIEW_LIMIT: usize = 400;
pub const ELLIPSIS: char = '…';
/// Shown in place of a channel title that Telegram did not provide.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// What gets delivered to the alert destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertPayload {
    /// Broadcast channel hit: preview wrapped with the channel title and a
    /// link back to the message when one is known.
    Channel {
        title: String,
        preview: String,
        link: Option<String>,
    },
    /// Any other source: the preview text on its own.
    Bare { preview: String },
}

impl AlertPayload {
    pub fn preview(&self) -> &str {
        match self {
            AlertPayload::Channel { preview, .. } | AlertPayload::Bare { preview } => preview,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            AlertPayload::Channel { link, .. } => link.as_deref(),
            AlertPayload::Bare { .. } => None,
        }
    }
}

/// Clip `text` to [`PREVIEW_LIMIT`] characters, appending [`ELLIPSIS`] when
/// anything was cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => {
            let mut clipped = text[..cut].to_string();
            clipped.push(ELLIPSIS);
            clipped
        }
        None => text.to_string(),
    }
}

/// Build the alert for a message that matched a keyword.
pub fn format_alert(message: &IncomingMessage) -> AlertPayload {
    let preview = preview(&message.text);
    match message.kind {
        SourceKind::Broadcast => AlertPayload::Channel {
            title: message
                .chat_title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            preview,
            link: message.permalink.clone(),
        },
        SourceKind::Group | SourceKind::Private => AlertPayload::Bare { preview },
    }
}

/// Single-line, length-capped form of `text` for log output.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(max_chars)
        .collect()
}
