use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use grammers_client::types::{Chat, Message};
use grammers_client::{Client, Config, InitParams, InputMessage, SignInError, Update};
use grammers_session::Session;
use tracing::{debug, error, info, warn};

use crate::alert::AlertPayload;
use crate::config::{bare_chat_id, ChatRef, Credentials, Destination, WatchList};
use crate::platform::{AlertSender, IncomingMessage, MessageHandler, MessageSource, SourceKind};

/// Blocking stdin prompt, only used during first-run login.
fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf.trim().to_owned())
}

/// Interactive login: phone number, login code, then the 2FA password if
/// the account has one.
async fn sign_in(client: &Client) -> Result<()> {
    let phone = prompt("Enter your phone number (international format): ")?;
    let token = client
        .request_login_code(&phone)
        .await
        .context("Failed to request login code")?;
    let code = prompt("Enter the code you received: ")?;

    match client.sign_in(&token, &code).await {
        Ok(_) => Ok(()),
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Enter your 2FA password (hint: {}): ", hint))?;
            client
                .check_password(password_token, password.trim())
                .await
                .context("Two-factor password rejected")?;
            Ok(())
        }
        Err(e) => Err(e).context("Sign-in failed"),
    }
}

/// Link to a message: public chats by username, the rest via `t.me/c/`.
fn permalink(
    kind: SourceKind,
    username: Option<&str>,
    chat_id: i64,
    message_id: i32,
) -> Option<String> {
    match (kind, username) {
        (SourceKind::Private, _) => None,
        (_, Some(username)) => Some(format!("https://t.me/{}/{}", username, message_id)),
        (_, None) => Some(format!("https://t.me/c/{}/{}", bare_chat_id(chat_id), message_id)),
    }
}

fn source_kind(chat: &Chat) -> SourceKind {
    match chat {
        Chat::Channel(_) => SourceKind::Broadcast,
        Chat::Group(_) => SourceKind::Group,
        Chat::User(_) => SourceKind::Private,
    }
}

fn to_incoming(message: &Message) -> IncomingMessage {
    let chat = message.chat();
    let kind = source_kind(&chat);
    let title = Some(chat.name())
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    IncomingMessage {
        chat_id: chat.id(),
        chat_title: title,
        kind,
        text: message.text().to_string(),
        permalink: permalink(kind, chat.username(), chat.id(), message.id()),
    }
}

/// Backslash-escape markdown punctuation so chat titles render literally.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_punctuation() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A backtick fence longer than any backtick run inside `body`.
fn code_fence(body: &str) -> String {
    let longest_run = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest_run.max(2) + 1)
}

/// Markdown body for alerts sent from the user session.
pub fn render_markdown(alert: &AlertPayload) -> String {
    match alert {
        AlertPayload::Channel {
            title,
            preview,
            link,
        } => {
            let fence = code_fence(preview);
            let mut text = format!(
                "🛑 **Keyword hit in {}**\n\n{fence}\n{}\n{fence}",
                escape_markdown(title),
                preview
            );
            if let Some(link) = link {
                text.push_str(&format!("\n[Jump to message]({})", link));
            }
            text
        }
        AlertPayload::Bare { preview } => preview.clone(),
    }
}

/// The MTProto user session that receives channel updates.
pub struct Listener {
    client: Client,
    session_path: PathBuf,
}

impl Listener {
    /// Connect with the application credentials, signing in interactively
    /// when the session file holds no login yet.
    pub async fn connect(credentials: &Credentials, session_path: &Path) -> Result<Self> {
        let session = Session::load_file_or_create(session_path)
            .with_context(|| format!("Failed to open session file: {}", session_path.display()))?;

        info!("Connecting to Telegram...");
        let client = Client::connect(Config {
            session,
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .context("Failed to connect to Telegram")?;

        let listener = Self {
            client,
            session_path: session_path.to_path_buf(),
        };

        if !listener
            .client
            .is_authorized()
            .await
            .context("Failed to check authorization")?
        {
            info!("No saved login, starting interactive sign-in");
            sign_in(&listener.client).await?;
            listener.save_session()?;
        }

        let me = listener
            .client
            .get_me()
            .await
            .context("Failed to fetch own account")?;
        info!("Signed in as user {} ({:?})", me.id(), me.username());

        Ok(listener)
    }

    fn save_session(&self) -> Result<()> {
        self.client
            .session()
            .save_to_file(&self.session_path)
            .with_context(|| {
                format!(
                    "Failed to save session file: {}",
                    self.session_path.display()
                )
            })?;
        debug!("Session saved to {}", self.session_path.display());
        Ok(())
    }

    /// Look up every watched username once so typos show up at startup.
    pub async fn check_watch_list(&self, watch: &WatchList) {
        for chat in watch.iter() {
            let ChatRef::Username(name) = chat else {
                continue;
            };
            match self.client.resolve_username(name).await {
                Ok(Some(resolved)) => debug!("Watching {} ({})", resolved.name(), resolved.id()),
                Ok(None) => warn!("Watched chat {} does not exist", chat),
                Err(e) => warn!("Failed to resolve watched chat {}: {}", chat, e),
            }
        }
    }
}

#[async_trait]
impl MessageSource for Listener {
    async fn subscribe(&self, watch: WatchList, handler: Arc<dyn MessageHandler>) -> Result<()> {
        info!("Subscribed to new messages from {} chats", watch.len());

        loop {
            let update = self
                .client
                .next_update()
                .await
                .context("Telegram connection closed")?;

            let Update::NewMessage(message) = update else {
                continue;
            };
            let chat = message.chat();
            if !watch.contains(chat.id(), chat.username()) {
                continue;
            }

            let incoming = to_incoming(&message);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = handler.handle(incoming).await {
                    error!("Error handling message: {:#}", e);
                }
            });
        }
    }
}

/// Sends alerts from the listening user session.
#[derive(Clone)]
pub struct SessionSender {
    client: Client,
    destination: Chat,
}

impl SessionSender {
    /// Resolve the alert destination once, up front.
    pub async fn resolve(listener: &Listener, destination: &Destination) -> Result<Self> {
        let client = listener.client.clone();
        let chat = match destination {
            Destination::SavedMessages => Chat::User(
                client
                    .get_me()
                    .await
                    .context("Failed to fetch own account")?,
            ),
            Destination::Username(name) => client
                .resolve_username(name)
                .await
                .with_context(|| format!("Failed to resolve alert chat @{}", name))?
                .with_context(|| format!("Alert chat @{} does not exist", name))?,
            Destination::ChatId(id) => find_dialog(&client, bare_chat_id(*id))
                .await?
                .with_context(|| format!("Alert chat {} is not among this account's dialogs", id))?,
        };

        info!("Alerts will be sent to {} ({})", destination, chat.id());
        Ok(Self {
            client,
            destination: chat,
        })
    }
}

async fn find_dialog(client: &Client, chat_id: i64) -> Result<Option<Chat>> {
    let mut dialogs = client.iter_dialogs();
    while let Some(dialog) = dialogs.next().await.context("Failed to list dialogs")? {
        let chat = dialog.chat();
        if chat.id() == chat_id {
            return Ok(Some(chat.clone()));
        }
    }
    Ok(None)
}

#[async_trait]
impl AlertSender for SessionSender {
    async fn send(&self, alert: &AlertPayload) -> Result<()> {
        let message = InputMessage::markdown(render_markdown(alert)).link_preview(false);
        self.client
            .send_message(&self.destination, message)
            .await
            .context("Failed to send alert message")?;
        Ok(())
    }
}
