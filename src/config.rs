use std::fmt;

use thiserror::Error;

use crate::filter::Keywords;

/// Channels and groups to monitor. Usernames or numeric IDs only; shareable
/// `t.me` links are not valid chat references.
pub const WATCHED_CHATS: &[&str] = &[
    "hyperliquid_announcements",
    "Bybit_Announcements",
    "binance_announcements",
    "Bitget_Announcements",
    "OKXAnnouncements",
];

/// Keywords that trigger an alert (case-insensitive).
pub const KEYWORDS: &[&str] = &["delist", "delisting", "remove trading", "下架", "退市"];

pub const ENV_API_ID: &str = "TELE_ID";
pub const ENV_API_HASH: &str = "TELE_HASH";
pub const ENV_BOT_TOKEN: &str = "ALERT_BOT_TOKEN";
pub const ENV_ALERT_CHAT: &str = "ALERT_CHAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} must be numeric, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("invalid chat reference {0:?}: use a username or numeric ID, not a t.me link")]
    InvalidChatRef(String),
    #[error("ALERT_CHAT must name a chat ID or @username when ALERT_BOT_TOKEN is set")]
    SavedMessagesWithBot,
}

/// A chat named by username or numeric ID.
///
/// Usernames are stored lower-cased since Telegram treats them
/// case-insensitively. IDs are kept bare: the `-100` mark of channels and the
/// leading `-` of basic groups are stripped, so `-1001234567890` and
/// `1234567890` refer to the same chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRef {
    Username(String),
    Id(i64),
}

impl ChatRef {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains("t.me") {
            return Err(ConfigError::InvalidChatRef(raw.to_string()));
        }
        if let Ok(id) = trimmed.parse::<i64>() {
            return checked_bare_chat_id(id)
                .map(ChatRef::Id)
                .ok_or_else(|| ConfigError::InvalidChatRef(raw.to_string()));
        }
        let name = trimmed.trim_start_matches('@');
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidChatRef(raw.to_string()));
        }
        Ok(ChatRef::Username(name.to_ascii_lowercase()))
    }

    pub fn matches(&self, chat_id: i64, username: Option<&str>) -> bool {
        match self {
            ChatRef::Id(id) => *id == bare_chat_id(chat_id),
            ChatRef::Username(name) => username.is_some_and(|u| u.eq_ignore_ascii_case(name)),
        }
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Username(name) => write!(f, "@{}", name),
            ChatRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Strip the marks Telegram clients put on group and channel IDs. `None`
/// for values with no bare form (`i64::MIN`).
pub fn checked_bare_chat_id(id: i64) -> Option<i64> {
    const CHANNEL_MARK: i64 = 1_000_000_000_000;
    if id >= 0 {
        return Some(id);
    }
    let negated = id.checked_neg()?;
    if negated >= CHANNEL_MARK {
        Some(negated - CHANNEL_MARK)
    } else {
        Some(negated)
    }
}

/// [`checked_bare_chat_id`] for IDs reported by Telegram. An ID with no bare
/// form is returned unchanged and so never equals a parsed one.
pub fn bare_chat_id(id: i64) -> i64 {
    checked_bare_chat_id(id).unwrap_or(id)
}

/// The set of chats whose new messages are inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchList {
    chats: Vec<ChatRef>,
}

impl WatchList {
    pub fn parse<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chats = Vec::new();
        for entry in entries {
            let chat = ChatRef::parse(entry.as_ref())?;
            if !chats.contains(&chat) {
                chats.push(chat);
            }
        }
        Ok(Self { chats })
    }

    pub fn contains(&self, chat_id: i64, username: Option<&str>) -> bool {
        self.chats.iter().any(|c| c.matches(chat_id, username))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatRef> {
        self.chats.iter()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }
}

/// Where alerts are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    /// The listening account's own "Saved Messages".
    #[default]
    SavedMessages,
    ChatId(i64),
    Username(String),
}

impl Destination {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("me")
            || trimmed.eq_ignore_ascii_case("self")
        {
            return Ok(Destination::SavedMessages);
        }
        if let Ok(id) = trimmed.parse::<i64>() {
            if checked_bare_chat_id(id).is_none() {
                return Err(ConfigError::InvalidChatRef(raw.to_string()));
            }
            return Ok(Destination::ChatId(id));
        }
        match ChatRef::parse(trimmed)? {
            ChatRef::Username(name) => Ok(Destination::Username(name)),
            ChatRef::Id(id) => Ok(Destination::ChatId(id)),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::SavedMessages => write!(f, "saved messages"),
            Destination::ChatId(id) => write!(f, "{}", id),
            Destination::Username(name) => write!(f, "@{}", name),
        }
    }
}

/// Application credentials for the MTProto user session.
#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

/// Process-lifetime configuration, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub credentials: Credentials,
    /// When set, alerts are sent by this bot instead of the listening account.
    pub bot_token: Option<String>,
    pub destination: Destination,
    pub watched: WatchList,
    pub keywords: Keywords,
}

impl WatchConfig {
    /// Load from the process environment, reading a `.env` file first if one
    /// exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_id = get(ENV_API_ID).ok_or(ConfigError::Missing(ENV_API_ID))?;
        let api_id = raw_id
            .parse::<i32>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: ENV_API_ID,
                value: raw_id.clone(),
            })?;
        let api_hash = get(ENV_API_HASH).ok_or(ConfigError::Missing(ENV_API_HASH))?;

        let bot_token = get(ENV_BOT_TOKEN);
        let destination = match get(ENV_ALERT_CHAT) {
            Some(raw) => Destination::parse(&raw)?,
            None => Destination::default(),
        };
        if bot_token.is_some() && destination == Destination::SavedMessages {
            return Err(ConfigError::SavedMessagesWithBot);
        }

        Ok(Self {
            credentials: Credentials { api_id, api_hash },
            bot_token,
            destination,
            watched: WatchList::parse(WATCHED_CHATS)?,
            keywords: Keywords::new(KEYWORDS),
        })
    }

    pub fn uses_bot(&self) -> bool {
        self.bot_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<WatchConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WatchConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = load(&[("TELE_ID", "12345"), ("TELE_HASH", "abcdef")]).unwrap();
        assert_eq!(config.credentials.api_id, 12345);
        assert_eq!(config.credentials.api_hash, "abcdef");
        assert_eq!(config.bot_token, None);
        assert!(!config.uses_bot());
        assert_eq!(config.destination, Destination::SavedMessages);
        assert_eq!(config.watched.len(), WATCHED_CHATS.len());
        assert_eq!(config.keywords.len(), KEYWORDS.len());
    }

    #[test]
    fn test_missing_api_id() {
        let err = load(&[("TELE_HASH", "abcdef")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELE_ID"));
    }

    #[test]
    fn test_non_numeric_api_id() {
        let err = load(&[("TELE_ID", "abc"), ("TELE_HASH", "abcdef")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: "TELE_ID",
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_missing_api_hash() {
        let err = load(&[("TELE_ID", "1"), ("TELE_HASH", "   ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELE_HASH"));
    }

    #[test]
    fn test_bot_with_chat_id() {
        let config = load(&[
            ("TELE_ID", "1"),
            ("TELE_HASH", "h"),
            ("ALERT_BOT_TOKEN", "123:ABC"),
            ("ALERT_CHAT", "-1009876"),
        ])
        .unwrap();
        assert!(config.uses_bot());
        assert_eq!(config.destination, Destination::ChatId(-1009876));
    }

    #[test]
    fn test_bot_requires_explicit_destination() {
        let err = load(&[
            ("TELE_ID", "1"),
            ("TELE_HASH", "h"),
            ("ALERT_BOT_TOKEN", "123:ABC"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::SavedMessagesWithBot);
    }

    #[test]
    fn test_empty_bot_token_is_unset() {
        let config = load(&[("TELE_ID", "1"), ("TELE_HASH", "h"), ("ALERT_BOT_TOKEN", "")]).unwrap();
        assert_eq!(config.bot_token, None);
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse("me").unwrap(), Destination::SavedMessages);
        assert_eq!(Destination::parse("Self").unwrap(), Destination::SavedMessages);
        assert_eq!(Destination::parse("42").unwrap(), Destination::ChatId(42));
        assert_eq!(
            Destination::parse("@alerts_room").unwrap(),
            Destination::Username("alerts_room".to_string())
        );
        assert!(Destination::parse("https://t.me/alerts_room").is_err());
    }

    #[test]
    fn test_chat_ref_rejects_links() {
        assert_eq!(
            ChatRef::parse("https://t.me/binance_announcements"),
            Err(ConfigError::InvalidChatRef(
                "https://t.me/binance_announcements".to_string()
            ))
        );
        assert!(ChatRef::parse("t.me/binance").is_err());
        assert!(ChatRef::parse("").is_err());
    }

    #[test]
    fn test_chat_ref_ids_are_bare() {
        assert_eq!(
            ChatRef::parse("-1001234567890").unwrap(),
            ChatRef::Id(1234567890)
        );
        assert_eq!(ChatRef::parse("-4567").unwrap(), ChatRef::Id(4567));
        assert_eq!(ChatRef::parse("890").unwrap(), ChatRef::Id(890));
    }

    #[test]
    fn test_out_of_range_ids_are_config_errors() {
        let min = i64::MIN.to_string();
        assert_eq!(
            ChatRef::parse(&min),
            Err(ConfigError::InvalidChatRef(min.clone()))
        );
        assert_eq!(
            Destination::parse(&min),
            Err(ConfigError::InvalidChatRef(min.clone()))
        );

        let err = load(&[
            ("TELE_ID", "1"),
            ("TELE_HASH", "h"),
            ("ALERT_CHAT", min.as_str()),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidChatRef(min));
    }

    #[test]
    fn test_bare_chat_id_never_overflows() {
        assert_eq!(checked_bare_chat_id(i64::MIN), None);
        assert_eq!(bare_chat_id(i64::MIN), i64::MIN);
        assert_eq!(bare_chat_id(i64::MAX), i64::MAX);
        assert_eq!(bare_chat_id(-i64::MAX), i64::MAX - 1_000_000_000_000);
        assert_eq!(bare_chat_id(-1001234567890), 1234567890);
        assert_eq!(bare_chat_id(-4567), 4567);
        assert!(!ChatRef::Id(0).matches(i64::MIN, None));
    }

    #[test]
    fn test_chat_ref_matches() {
        let by_name = ChatRef::parse("@Bybit_Announcements").unwrap();
        assert!(by_name.matches(1, Some("bybit_announcements")));
        assert!(!by_name.matches(1, None));
        assert!(!by_name.matches(1, Some("bybit")));

        let by_id = ChatRef::parse("-1001234567890").unwrap();
        assert!(by_id.matches(1234567890, None));
        assert!(by_id.matches(-1001234567890, Some("whatever")));
        assert!(!by_id.matches(7654321, None));
    }

    #[test]
    fn test_watch_list_dedups_and_contains() {
        let list = WatchList::parse(["binance_announcements", "@Binance_Announcements", "77"]).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(5, Some("BINANCE_ANNOUNCEMENTS")));
        assert!(list.contains(77, None));
        assert!(!list.contains(78, Some("okx")));
    }

    #[test]
    fn test_credentials_debug_redacts_hash() {
        let creds = Credentials {
            api_id: 7,
            api_hash: "secret-hash".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("secret-hash"));
    }
}
