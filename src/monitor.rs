use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::WatchConfig;
use crate::platform::mtproto::Listener;
use crate::platform::{AlertConnection, MessageSource};
use crate::watcher::Watcher;

/// Session file for the listening user account.
pub const LISTENER_SESSION: &str = "listener.session";

/// Connect, then service the listener and the alert connection until either
/// one disconnects or fails. There is no restart; the caller exits.
pub async fn run(config: WatchConfig) -> Result<()> {
    let config = Arc::new(config);

    let listener = Listener::connect(&config.credentials, Path::new(LISTENER_SESSION)).await?;
    listener.check_watch_list(&config.watched).await;

    let alerts = AlertConnection::connect(&config, &listener).await?;
    let watcher = Arc::new(Watcher::new(config.keywords.clone(), alerts.sender()));

    info!("🔍 Monitoring announcement channels...");
    tokio::try_join!(
        listener.subscribe(config.watched.clone(), watcher),
        alerts.run(Arc::clone(&config)),
    )?;

    info!("Disconnected");
    Ok(())
}
